//! The ledger collaborator.
//!
//! Whatever actually holds balances and the published root (a deployed
//! distribution contract, or the in-memory double used by tests and devnet)
//! is reached through this trait and nothing else. The engine never signs,
//! never stores ledger state, and never assumes a write landed until a
//! read-back confirms it.

use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;

use crate::crypto::Hash;
use crate::types::{Address, U256};

/// Transaction identifier returned by a ledger write, `0x`-prefixed hex.
pub type TxHash = String;

/// Failure reported by a [`Ledger`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LedgerError {
    /// The ledger processed the call and refused it (bad proof, not owner,
    /// nothing to claim...).
    #[error("ledger rejected the call: {0}")]
    Rejected(String),

    /// The ledger could not be reached or did not answer in time.
    #[error("ledger unavailable: {0}")]
    Unavailable(String),
}

/// Narrow interface to the external ledger.
#[async_trait]
pub trait Ledger: Send + Sync {
    /// The root currently published.
    async fn read_root(&self) -> Result<Hash, LedgerError>;

    /// Replace the published root. Owner-only on a real ledger.
    async fn update_root(&self, root: Hash) -> Result<TxHash, LedgerError>;

    /// Total ever claimed by `account`. Never decreases.
    async fn cumulative_claimed(&self, account: &Address) -> Result<U256, LedgerError>;

    /// Claim up to `cumulative_amount` for `claimant`. The ledger verifies
    /// `proof` against its root and pays out the difference to what was
    /// already claimed.
    async fn claim(
        &self,
        claimant: &Address,
        cumulative_amount: U256,
        proof: &[Hash],
    ) -> Result<TxHash, LedgerError>;
}

#[async_trait]
impl<L: Ledger + ?Sized> Ledger for Arc<L> {
    async fn read_root(&self) -> Result<Hash, LedgerError> {
        (**self).read_root().await
    }

    async fn update_root(&self, root: Hash) -> Result<TxHash, LedgerError> {
        (**self).update_root(root).await
    }

    async fn cumulative_claimed(&self, account: &Address) -> Result<U256, LedgerError> {
        (**self).cumulative_claimed(account).await
    }

    async fn claim(
        &self,
        claimant: &Address,
        cumulative_amount: U256,
        proof: &[Hash],
    ) -> Result<TxHash, LedgerError> {
        (**self).claim(claimant, cumulative_amount, proof).await
    }
}
