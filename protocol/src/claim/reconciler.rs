//! Claim state machine.
//!
//! ```text
//!                   ┌──────────────┐
//!   not in tree ──► │ NoAllocation │
//!                   └──────────────┘
//!                   ┌──────────────────────────────┐  claim() ok   ┌──────────────┐
//!   claimed < A ──► │ Claimable { delta = A - c }  │ ────────────► │ FullyClaimed │
//!                   └──────────────────────────────┘               └──────────────┘
//!                                  ▲                                       │
//!                                  └──── new tree raises A ────────────────┘
//! ```
//!
//! `A` is the cumulative allocation committed in the tree, `c` what the
//! ledger reports as claimed. The reconciler only ever asks the ledger to
//! bring `c` up to `A`, and only reports success after reading `c` back.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::claim::ledger::{Ledger, TxHash};
use crate::error::{AirdropError, Result};
use crate::merkle::MerkleTree;
use crate::types::{hash_to_hex, Address, U256};

/// Where one recipient stands against the current tree.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "camelCase")]
pub enum ClaimState {
    /// The address is not in the tree.
    NoAllocation,
    /// Part of the allocation is still unclaimed. `delta` is always positive.
    Claimable {
        #[serde(with = "crate::types::decimal")]
        allocation: U256,
        #[serde(with = "crate::types::decimal")]
        claimed: U256,
        #[serde(with = "crate::types::decimal")]
        delta: U256,
    },
    /// Nothing left to claim until a later tree raises the allocation.
    FullyClaimed {
        #[serde(with = "crate::types::decimal")]
        allocation: U256,
        #[serde(with = "crate::types::decimal")]
        claimed: U256,
    },
}

impl ClaimState {
    /// Classify a committed allocation against the ledger's claimed total.
    pub fn from_balances(allocation: U256, claimed: U256) -> Self {
        if claimed >= allocation {
            ClaimState::FullyClaimed {
                allocation,
                claimed,
            }
        } else {
            ClaimState::Claimable {
                allocation,
                claimed,
                delta: allocation - claimed,
            }
        }
    }

    /// Amount a claim would unlock right now.
    pub fn unlocked(&self) -> U256 {
        match self {
            ClaimState::Claimable { delta, .. } => *delta,
            _ => U256::zero(),
        }
    }
}

/// Confirmed outcome of a claim.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClaimReceipt {
    pub address: Address,
    pub tx_hash: TxHash,
    /// Cumulative claimed total read back after the claim.
    #[serde(with = "crate::types::decimal")]
    pub claimed: U256,
    /// What this claim paid out.
    #[serde(with = "crate::types::decimal")]
    pub unlocked: U256,
}

/// Drives claims for one distribution against one ledger.
pub struct ClaimReconciler<L> {
    tree: Arc<MerkleTree>,
    ledger: L,
}

impl<L: Ledger> ClaimReconciler<L> {
    pub fn new(tree: Arc<MerkleTree>, ledger: L) -> Self {
        Self { tree, ledger }
    }

    pub fn tree(&self) -> &Arc<MerkleTree> {
        &self.tree
    }

    pub fn ledger(&self) -> &L {
        &self.ledger
    }

    /// Current state for `address`.
    ///
    /// An absent address is a state, not an error. Duplicate entries are an
    /// error: there is no single allocation to report.
    pub async fn status(&self, address: &Address) -> Result<ClaimState> {
        let index = match self.tree.find(address) {
            Ok(index) => index,
            Err(AirdropError::NotFound { .. }) => return Ok(ClaimState::NoAllocation),
            Err(e) => return Err(e),
        };
        let allocation = self.tree.allocation(index)?.amount;
        let claimed = self.ledger.cumulative_claimed(address).await?;
        if claimed > allocation {
            tracing::warn!(
                %address,
                %allocation,
                %claimed,
                "ledger reports more claimed than allocated"
            );
        }
        Ok(ClaimState::from_balances(allocation, claimed))
    }

    /// Claim everything currently unlocked for `address`.
    ///
    /// Sends the cumulative allocation, never the delta: the ledger pays the
    /// difference itself. Succeeds only once the ledger's claimed total reads
    /// back as exactly the allocation.
    pub async fn claim(&self, address: &Address) -> Result<ClaimReceipt> {
        let index = self.tree.find(address)?;
        let allocation = *self.tree.allocation(index)?;

        let claimed_before = self.ledger.cumulative_claimed(address).await?;
        let state = ClaimState::from_balances(allocation.amount, claimed_before);
        if let ClaimState::FullyClaimed { allocation, claimed } = state {
            tracing::debug!(%address, %allocation, "nothing to claim");
            return Err(AirdropError::AlreadyClaimed {
                address: address.to_hex(),
                allocation,
                claimed,
            });
        }

        let published = self.ledger.read_root().await?;
        if published != self.tree.root() {
            tracing::warn!(
                %address,
                local = %self.tree.root_hex(),
                published = %hash_to_hex(&published),
                "refusing claim against a stale distribution"
            );
            return Err(AirdropError::StaleDistribution {
                local: self.tree.root_hex(),
                published: hash_to_hex(&published),
            });
        }

        let proof = self.tree.proof(index)?;
        let tx_hash = self
            .ledger
            .claim(address, allocation.amount, &proof)
            .await?;

        let claimed_after = self.ledger.cumulative_claimed(address).await?;
        if claimed_after != allocation.amount {
            tracing::warn!(
                %address,
                requested = %allocation.amount,
                observed = %claimed_after,
                tx = %tx_hash,
                "claimed balance does not match the allocation after claim"
            );
            return Err(AirdropError::InconsistentState {
                context: format!("claimed balance of {} after claim", address),
                requested: allocation.amount.to_string(),
                observed: claimed_after.to_string(),
                tx_hash: Some(tx_hash),
            });
        }

        let unlocked = state.unlocked();
        tracing::info!(
            %address,
            %unlocked,
            claimed = %claimed_after,
            tx = %tx_hash,
            "claim confirmed"
        );
        Ok(ClaimReceipt {
            address: *address,
            tx_hash,
            claimed: claimed_after,
            unlocked,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::claim::testing::FakeLedger;
    use crate::error::ErrorKind;
    use crate::merkle::Allocation;

    fn addr(byte: u8) -> Address {
        Address::from_bytes([byte; 20])
    }

    fn tree(entries: &[(u8, u64)]) -> Arc<MerkleTree> {
        let allocations = entries
            .iter()
            .map(|(b, amount)| Allocation::new(addr(*b), U256::from(*amount)))
            .collect();
        Arc::new(MerkleTree::build(allocations).unwrap())
    }

    fn reconciler(entries: &[(u8, u64)]) -> ClaimReconciler<FakeLedger> {
        let tree = tree(entries);
        let ledger = FakeLedger::with_root(tree.root());
        ClaimReconciler::new(tree, ledger)
    }

    #[test]
    fn test_state_from_balances() {
        assert_eq!(
            ClaimState::from_balances(U256::from(100u64), U256::from(40u64)),
            ClaimState::Claimable {
                allocation: U256::from(100u64),
                claimed: U256::from(40u64),
                delta: U256::from(60u64),
            }
        );
        assert!(matches!(
            ClaimState::from_balances(U256::from(100u64), U256::from(100u64)),
            ClaimState::FullyClaimed { .. }
        ));
        assert_eq!(ClaimState::NoAllocation.unlocked(), U256::zero());
    }

    #[test]
    fn test_state_serializes_with_tag() {
        let json = serde_json::to_value(ClaimState::from_balances(
            U256::from(10u64),
            U256::from(3u64),
        ))
        .unwrap();
        assert_eq!(json["state"], "claimable");
        assert_eq!(json["delta"], "7");
    }

    #[tokio::test]
    async fn test_status_absent_is_no_allocation() {
        let r = reconciler(&[(1, 100), (2, 200)]);
        assert_eq!(r.status(&addr(9)).await.unwrap(), ClaimState::NoAllocation);
    }

    #[tokio::test]
    async fn test_status_ambiguous_is_error() {
        let r = reconciler(&[(1, 100), (1, 200)]);
        let err = r.status(&addr(1)).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Ambiguous);
    }

    #[tokio::test]
    async fn test_claim_moves_to_fully_claimed() {
        let r = reconciler(&[(1, 100), (2, 200), (3, 300)]);
        let receipt = r.claim(&addr(2)).await.unwrap();
        assert_eq!(receipt.claimed, U256::from(200u64));
        assert_eq!(receipt.unlocked, U256::from(200u64));
        assert!(matches!(
            r.status(&addr(2)).await.unwrap(),
            ClaimState::FullyClaimed { .. }
        ));
    }

    #[tokio::test]
    async fn test_partial_claim_unlocks_delta_but_sends_cumulative() {
        let r = reconciler(&[(1, 150), (2, 10)]);
        r.ledger().state.lock().claimed.insert(addr(1), U256::from(100u64));

        let receipt = r.claim(&addr(1)).await.unwrap();
        assert_eq!(receipt.unlocked, U256::from(50u64));
        assert_eq!(receipt.claimed, U256::from(150u64));
        assert_eq!(
            r.ledger().state.lock().claimed[&addr(1)],
            U256::from(150u64)
        );
    }

    #[tokio::test]
    async fn test_second_claim_makes_no_ledger_write() {
        let r = reconciler(&[(1, 100), (2, 200)]);
        r.claim(&addr(1)).await.unwrap();
        assert_eq!(r.ledger().state.lock().claims, 1);

        let err = r.claim(&addr(1)).await.unwrap_err();
        assert!(matches!(err, AirdropError::AlreadyClaimed { .. }));
        assert_eq!(r.ledger().state.lock().claims, 1);
    }

    #[tokio::test]
    async fn test_claim_absent_address() {
        let r = reconciler(&[(1, 100)]);
        let err = r.claim(&addr(5)).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
        assert_eq!(r.ledger().state.lock().claims, 0);
    }

    #[tokio::test]
    async fn test_stale_root_refused() {
        let r = reconciler(&[(1, 100), (2, 200)]);
        r.ledger().state.lock().root = [0xee; 32];
        let err = r.claim(&addr(1)).await.unwrap_err();
        assert!(matches!(err, AirdropError::StaleDistribution { .. }));
        assert_eq!(r.ledger().state.lock().claims, 0);
    }

    #[tokio::test]
    async fn test_short_readback_is_inconsistent() {
        let r = reconciler(&[(1, 100), (2, 200)]);
        r.ledger().state.lock().claim_cap = Some(U256::from(40u64));
        match r.claim(&addr(1)).await.unwrap_err() {
            AirdropError::InconsistentState {
                requested,
                observed,
                tx_hash,
                ..
            } => {
                assert_eq!(requested, "100");
                assert_eq!(observed, "40");
                assert!(tx_hash.is_some());
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn test_ledger_failure_propagates() {
        let r = reconciler(&[(1, 100)]);
        r.ledger().state.lock().unavailable = true;
        let err = r.claim(&addr(1)).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Ledger);
    }

    #[tokio::test]
    async fn test_raised_allocation_reopens_claim() {
        let first = tree(&[(1, 100), (2, 50)]);
        let ledger = Arc::new(FakeLedger::with_root(first.root()));
        ClaimReconciler::new(first, ledger.clone())
            .claim(&addr(1))
            .await
            .unwrap();

        let second = tree(&[(1, 250), (2, 50)]);
        ledger.state.lock().root = second.root();
        let r = ClaimReconciler::new(second, ledger.clone());
        assert_eq!(r.status(&addr(1)).await.unwrap().unlocked(), U256::from(150u64));
        let receipt = r.claim(&addr(1)).await.unwrap();
        assert_eq!(receipt.unlocked, U256::from(150u64));
        assert_eq!(receipt.claimed, U256::from(250u64));
    }
}
