//! # Merkle Distributor Contract
//!
//! Reference implementation of the on-chain side of a cumulative airdrop.
//! The owner publishes a Merkle root; anyone listed in the tree claims by
//! presenting their *total* allocation and a proof. The contract pays out
//! the difference between that total and what the caller already claimed.
//!
//! ## Security Model
//!
//! - **Root gating**: only the owner can replace the root.
//! - **Caller-bound leaves**: the leaf is recomputed from the caller's own
//!   address, so a proof for someone else's allocation is useless.
//! - **Monotonic claims**: `user_total_claimed` only ever increases, and a
//!   claim whose total does not exceed it is rejected outright.
//! - **Overflow**: balances use `checked_add`; wrapping arithmetic and money
//!   do not mix.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use airdrop_protocol::crypto::Hash;
use airdrop_protocol::merkle::{leaf_hash, verify, Allocation};
use airdrop_protocol::types::{hash_to_hex, Address, U256};

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Errors that can occur during distributor operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DistributorError {
    /// The caller is not the contract owner.
    #[error("unauthorized: only the owner can update the merkle root")]
    NotOwner,

    /// The proof does not connect the caller's leaf to the current root.
    #[error("Invalid proof")]
    InvalidProof,

    /// The claimed total does not exceed what was already claimed.
    #[error("Nothing to claim: total allocation {total}, already claimed {claimed}")]
    NothingToClaim {
        /// Total allocation presented by the caller.
        total: U256,
        /// Cumulative amount already paid out.
        claimed: U256,
    },

    /// Crediting the caller would overflow 256 bits.
    #[error("balance overflow crediting {amount}")]
    BalanceOverflow {
        /// The amount that was being credited.
        amount: U256,
    },
}

// ---------------------------------------------------------------------------
// Events
// ---------------------------------------------------------------------------

/// Log entry emitted by a state-changing call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "camelCase")]
pub enum DistributorEvent {
    MerkleRootUpdated {
        previous: String,
        updated: String,
        at: DateTime<Utc>,
    },
    TokensClaimed {
        account: Address,
        #[serde(with = "airdrop_protocol::types::decimal")]
        amount: U256,
        #[serde(with = "airdrop_protocol::types::decimal")]
        total_claimed: U256,
        at: DateTime<Utc>,
    },
}

// ---------------------------------------------------------------------------
// Contract
// ---------------------------------------------------------------------------

/// In-memory distributor state.
#[derive(Debug, Clone)]
pub struct MerkleDistributor {
    owner: Address,
    merkle_root: Hash,
    claimed: HashMap<Address, U256>,
    balances: HashMap<Address, U256>,
    total_distributed: U256,
    events: Vec<DistributorEvent>,
}

impl MerkleDistributor {
    /// Deploy with an all-zero root. Nothing is claimable until the owner
    /// publishes one.
    pub fn new(owner: Address) -> Self {
        Self {
            owner,
            merkle_root: [0u8; 32],
            claimed: HashMap::new(),
            balances: HashMap::new(),
            total_distributed: U256::zero(),
            events: Vec::new(),
        }
    }

    pub fn owner(&self) -> Address {
        self.owner
    }

    pub fn merkle_root(&self) -> Hash {
        self.merkle_root
    }

    /// Replace the root.
    ///
    /// # Errors
    ///
    /// Returns [`DistributorError::NotOwner`] for any caller but the owner.
    pub fn update_merkle_root(&mut self, caller: &Address, root: Hash) -> Result<(), DistributorError> {
        if *caller != self.owner {
            return Err(DistributorError::NotOwner);
        }
        let previous = std::mem::replace(&mut self.merkle_root, root);
        self.events.push(DistributorEvent::MerkleRootUpdated {
            previous: hash_to_hex(&previous),
            updated: hash_to_hex(&root),
            at: Utc::now(),
        });
        Ok(())
    }

    /// Claim against the current root. Returns the amount paid out.
    ///
    /// # Errors
    ///
    /// - [`DistributorError::InvalidProof`] if `(caller, total_allocation)`
    ///   is not in the tree.
    /// - [`DistributorError::NothingToClaim`] if `total_allocation` is not
    ///   above the caller's claimed total.
    /// - [`DistributorError::BalanceOverflow`] if crediting would overflow.
    pub fn claim_tokens(
        &mut self,
        caller: &Address,
        total_allocation: U256,
        proof: &[Hash],
    ) -> Result<U256, DistributorError> {
        let leaf = leaf_hash(&Allocation::new(*caller, total_allocation));
        if !verify(&leaf, proof, &self.merkle_root) {
            return Err(DistributorError::InvalidProof);
        }

        let claimed = self.user_total_claimed(caller);
        if total_allocation <= claimed {
            return Err(DistributorError::NothingToClaim {
                total: total_allocation,
                claimed,
            });
        }
        let amount = total_allocation - claimed;

        let balance = self
            .balance_of(caller)
            .checked_add(amount)
            .ok_or(DistributorError::BalanceOverflow { amount })?;
        let distributed = self
            .total_distributed
            .checked_add(amount)
            .ok_or(DistributorError::BalanceOverflow { amount })?;

        self.balances.insert(*caller, balance);
        self.claimed.insert(*caller, total_allocation);
        self.total_distributed = distributed;
        self.events.push(DistributorEvent::TokensClaimed {
            account: *caller,
            amount,
            total_claimed: total_allocation,
            at: Utc::now(),
        });
        Ok(amount)
    }

    /// Cumulative amount `account` has claimed so far.
    pub fn user_total_claimed(&self, account: &Address) -> U256 {
        self.claimed.get(account).copied().unwrap_or_default()
    }

    /// Tokens credited to `account` by claims.
    pub fn balance_of(&self, account: &Address) -> U256 {
        self.balances.get(account).copied().unwrap_or_default()
    }

    pub fn total_distributed(&self) -> U256 {
        self.total_distributed
    }

    /// Every event emitted so far, oldest first.
    pub fn events(&self) -> &[DistributorEvent] {
        &self.events
    }
}
