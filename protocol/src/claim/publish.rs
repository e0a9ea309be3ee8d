//! Root publication.
//!
//! Publishing is idempotent: if the ledger already holds the root, no
//! transaction is sent. Otherwise the write is followed by a read-back, and
//! the caller only hears "updated" when the ledger actually says so.

use crate::claim::ledger::{Ledger, TxHash};
use crate::crypto::Hash;
use crate::error::{AirdropError, Result};
use crate::types::hash_to_hex;

/// Outcome of [`publish_root`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RootUpdate {
    /// The ledger already held this root. No transaction was sent.
    Unchanged { current: Hash },
    /// A transaction was sent and the read-back matched.
    Updated { tx_hash: TxHash, updated: Hash },
}

impl RootUpdate {
    /// The root the ledger holds after the call.
    pub fn root(&self) -> Hash {
        match self {
            RootUpdate::Unchanged { current } => *current,
            RootUpdate::Updated { updated, .. } => *updated,
        }
    }

    pub fn tx_hash(&self) -> Option<&str> {
        match self {
            RootUpdate::Unchanged { .. } => None,
            RootUpdate::Updated { tx_hash, .. } => Some(tx_hash.as_str()),
        }
    }
}

/// Make `root` the ledger's published root.
pub async fn publish_root<L: Ledger + ?Sized>(ledger: &L, root: Hash) -> Result<RootUpdate> {
    let current = ledger.read_root().await?;
    if current == root {
        tracing::info!(root = %hash_to_hex(&root), "merkle root already published");
        return Ok(RootUpdate::Unchanged { current });
    }

    let tx_hash = ledger.update_root(root).await?;
    let observed = ledger.read_root().await?;
    if observed != root {
        tracing::warn!(
            requested = %hash_to_hex(&root),
            observed = %hash_to_hex(&observed),
            tx = %tx_hash,
            "merkle root read-back mismatch"
        );
        return Err(AirdropError::InconsistentState {
            context: "merkle root read-back".to_string(),
            requested: hash_to_hex(&root),
            observed: hash_to_hex(&observed),
            tx_hash: Some(tx_hash),
        });
    }

    tracing::info!(
        previous = %hash_to_hex(&current),
        updated = %hash_to_hex(&root),
        tx = %tx_hash,
        "merkle root updated"
    );
    Ok(RootUpdate::Updated {
        tx_hash,
        updated: root,
    })
}
