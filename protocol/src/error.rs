//! Error types for the airdrop engine.
//!
//! Every fallible operation in this crate returns an [`AirdropError`]. The
//! variants group into a small set of [`ErrorKind`]s so callers (the HTTP
//! layer, the CLI) can decide what to do without matching on every variant.

use primitive_types::U256;
use thiserror::Error;

use crate::claim::LedgerError;

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, AirdropError>;

/// Coarse classification of an [`AirdropError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Malformed input. Caller-fixable, reported before any hashing or ledger call.
    Validation,
    /// The address has no allocation in the current tree.
    NotFound,
    /// The address has more than one allocation in the current tree.
    Ambiguous,
    /// The allocation is fully claimed; nothing was sent to the ledger.
    AlreadyClaimed,
    /// An externally confirmed value disagrees with the requested one.
    InconsistentState,
    /// A dump carries a format tag this version does not understand.
    FormatVersion,
    /// The ledger collaborator failed or rejected the call.
    Ledger,
    /// Filesystem or JSON failure.
    Io,
}

impl ErrorKind {
    /// Stable machine-readable name, used in API error bodies.
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::Validation => "validation",
            ErrorKind::NotFound => "not_found",
            ErrorKind::Ambiguous => "ambiguous",
            ErrorKind::AlreadyClaimed => "already_claimed",
            ErrorKind::InconsistentState => "inconsistent_state",
            ErrorKind::FormatVersion => "format_version",
            ErrorKind::Ledger => "ledger",
            ErrorKind::Io => "io",
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Errors produced by the leaf codec, tree builder, serializer and reconciler.
#[derive(Debug, Error)]
pub enum AirdropError {
    /// Not `0x` followed by 40 hex digits.
    #[error("Invalid address format: {0}")]
    InvalidAddress(String),

    /// Not a non-negative decimal integer that fits in 256 bits.
    #[error("Invalid amount format: {0}")]
    InvalidAmount(String),

    /// Not `0x` followed by 64 hex digits.
    #[error("Invalid merkle root format: {0}. Must be a 0x-prefixed 32-byte hex string")]
    InvalidRoot(String),

    /// A node or proof element that is not a 32-byte hex string.
    #[error("invalid hash: {0}")]
    InvalidHash(String),

    /// One entry of an allocation batch is malformed. The whole batch is rejected.
    #[error("allocation #{index} rejected: {reason}")]
    InvalidAllocation {
        /// Zero-based position of the entry in the batch.
        index: usize,
        /// What was wrong with it.
        reason: String,
    },

    /// A tree needs at least one leaf; an empty tree has no root.
    #[error("cannot build a merkle tree from zero allocations")]
    EmptyTree,

    /// A leaf index past the end of the tree.
    #[error("leaf index {index} is out of range for tree with {len} leaves")]
    IndexOutOfRange {
        /// Requested index.
        index: usize,
        /// Number of leaves in the tree.
        len: usize,
    },

    /// The dump encodes leaves with types other than `(address, uint256)`.
    #[error("unsupported leaf encoding: {0:?}")]
    UnsupportedLeafEncoding(Vec<String>),

    /// The dump is structurally inconsistent.
    #[error("corrupt dump: {0}")]
    CorruptDump(String),

    /// The dump's format tag is unknown. Parsing is refused rather than guessed.
    #[error("unsupported dump format: {found:?}")]
    UnsupportedFormat {
        /// The tag found in the dump.
        found: String,
    },

    /// The address is absent from the current tree.
    #[error("no allocation found for {address} in the current merkle tree")]
    NotFound {
        /// The address that was looked up.
        address: String,
    },

    /// The address appears in several leaves; refusing to pick one.
    #[error("address {address} has {} allocations in the same tree (indices {indices:?})", .indices.len())]
    AmbiguousAllocation {
        /// The address that was looked up.
        address: String,
        /// Every tree index that carries it.
        indices: Vec<usize>,
    },

    /// The cumulative allocation has already been claimed in full.
    #[error("nothing to claim for {address}: allocation {allocation}, already claimed {claimed}")]
    AlreadyClaimed {
        /// The claimant.
        address: String,
        /// Cumulative allocation committed in the tree.
        allocation: U256,
        /// Cumulative amount the ledger reports as claimed.
        claimed: U256,
    },

    /// The local tree does not match the root the ledger has published.
    #[error("distribution is stale: local root {local}, published root {published}")]
    StaleDistribution {
        /// Root of the tree held locally.
        local: String,
        /// Root currently stored by the ledger.
        published: String,
    },

    /// A read-back after a ledger write did not match what was submitted.
    #[error("{context}: requested {requested}, observed {observed}")]
    InconsistentState {
        /// What was being confirmed.
        context: String,
        /// The value submitted.
        requested: String,
        /// The value read back.
        observed: String,
        /// Transaction hash of the submission, if one was sent.
        tx_hash: Option<String>,
    },

    /// The ledger collaborator failed.
    #[error(transparent)]
    Ledger(#[from] LedgerError),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

impl AirdropError {
    /// Classify this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            AirdropError::InvalidAddress(_)
            | AirdropError::InvalidAmount(_)
            | AirdropError::InvalidRoot(_)
            | AirdropError::InvalidHash(_)
            | AirdropError::InvalidAllocation { .. }
            | AirdropError::EmptyTree
            | AirdropError::IndexOutOfRange { .. }
            | AirdropError::UnsupportedLeafEncoding(_)
            | AirdropError::CorruptDump(_) => ErrorKind::Validation,
            AirdropError::UnsupportedFormat { .. } => ErrorKind::FormatVersion,
            AirdropError::NotFound { .. } => ErrorKind::NotFound,
            AirdropError::AmbiguousAllocation { .. } => ErrorKind::Ambiguous,
            AirdropError::AlreadyClaimed { .. } => ErrorKind::AlreadyClaimed,
            AirdropError::StaleDistribution { .. } | AirdropError::InconsistentState { .. } => {
                ErrorKind::InconsistentState
            }
            AirdropError::Ledger(_) => ErrorKind::Ledger,
            AirdropError::Io(_) | AirdropError::Json(_) => ErrorKind::Io,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kinds_are_distinguishable() {
        let errors = vec![
            AirdropError::InvalidAddress("0x12".into()),
            AirdropError::NotFound {
                address: "0x00".into(),
            },
            AirdropError::AmbiguousAllocation {
                address: "0x00".into(),
                indices: vec![0, 3],
            },
            AirdropError::AlreadyClaimed {
                address: "0x00".into(),
                allocation: U256::from(100u64),
                claimed: U256::from(100u64),
            },
            AirdropError::InconsistentState {
                context: "root read-back".into(),
                requested: "a".into(),
                observed: "b".into(),
                tx_hash: None,
            },
            AirdropError::UnsupportedFormat {
                found: "standard-v2".into(),
            },
        ];
        let kinds: Vec<ErrorKind> = errors.iter().map(|e| e.kind()).collect();
        assert_eq!(
            kinds,
            vec![
                ErrorKind::Validation,
                ErrorKind::NotFound,
                ErrorKind::Ambiguous,
                ErrorKind::AlreadyClaimed,
                ErrorKind::InconsistentState,
                ErrorKind::FormatVersion,
            ]
        );
    }

    #[test]
    fn test_inconsistent_state_message_carries_both_values() {
        let err = AirdropError::InconsistentState {
            context: "claimed balance did not advance".into(),
            requested: "100".into(),
            observed: "40".into(),
            tx_hash: Some("0xfeed".into()),
        };
        let msg = err.to_string();
        assert!(msg.contains("requested 100"));
        assert!(msg.contains("observed 40"));
    }

    #[test]
    fn test_ambiguous_message_counts_indices() {
        let err = AirdropError::AmbiguousAllocation {
            address: "0xab".into(),
            indices: vec![1, 4, 7],
        };
        assert!(err.to_string().contains("has 3 allocations"));
    }
}
