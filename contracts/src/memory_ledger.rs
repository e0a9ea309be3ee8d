//! # In-Memory Ledger
//!
//! Adapts a [`MerkleDistributor`] to the protocol's [`Ledger`] trait so the
//! node and the tests can run the whole claim flow without a chain.
//!
//! Every write gets a transaction hash: the Keccak-256 of a per-ledger
//! sequence number and the call's arguments. Hashes are unique within one
//! ledger instance and carry no other meaning.

use async_trait::async_trait;
use parking_lot::Mutex;

use airdrop_protocol::claim::{Ledger, LedgerError, TxHash};
use airdrop_protocol::crypto::{keccak256_multi, Hash};
use airdrop_protocol::types::{amount_to_word, hash_to_hex, Address, U256};

use crate::merkle_distributor::{DistributorError, MerkleDistributor};

struct Inner {
    contract: MerkleDistributor,
    nonce: u64,
}

/// A distributor contract behind a lock, acting as the ledger.
///
/// Root updates are sent as `operator`, which is also the contract owner.
pub struct MemoryLedger {
    operator: Address,
    inner: Mutex<Inner>,
}

impl MemoryLedger {
    /// Deploy a fresh distributor owned by `operator`.
    pub fn new(operator: Address) -> Self {
        Self::from_contract(operator, MerkleDistributor::new(operator))
    }

    /// Wrap an existing contract. `operator` signs root updates.
    pub fn from_contract(operator: Address, contract: MerkleDistributor) -> Self {
        Self {
            operator,
            inner: Mutex::new(Inner { contract, nonce: 0 }),
        }
    }

    pub fn operator(&self) -> Address {
        self.operator
    }

    /// Run `f` against a read-only view of the contract.
    pub fn inspect<R>(&self, f: impl FnOnce(&MerkleDistributor) -> R) -> R {
        f(&self.inner.lock().contract)
    }
}

fn next_tx_hash(inner: &mut Inner, payload: &[&[u8]]) -> TxHash {
    inner.nonce += 1;
    let nonce = inner.nonce.to_be_bytes();
    let mut parts: Vec<&[u8]> = Vec::with_capacity(payload.len() + 1);
    parts.push(&nonce);
    parts.extend_from_slice(payload);
    hash_to_hex(&keccak256_multi(&parts))
}

fn rejected(err: DistributorError) -> LedgerError {
    LedgerError::Rejected(err.to_string())
}

#[async_trait]
impl Ledger for MemoryLedger {
    async fn read_root(&self) -> Result<Hash, LedgerError> {
        Ok(self.inner.lock().contract.merkle_root())
    }

    async fn update_root(&self, root: Hash) -> Result<TxHash, LedgerError> {
        let mut inner = self.inner.lock();
        inner
            .contract
            .update_merkle_root(&self.operator, root)
            .map_err(rejected)?;
        let tx = next_tx_hash(&mut inner, &[b"updateMerkleRoot".as_slice(), root.as_slice()]);
        tracing::debug!(tx = %tx, root = %hash_to_hex(&root), "memory ledger root updated");
        Ok(tx)
    }

    async fn cumulative_claimed(&self, account: &Address) -> Result<U256, LedgerError> {
        Ok(self.inner.lock().contract.user_total_claimed(account))
    }

    async fn claim(
        &self,
        claimant: &Address,
        cumulative_amount: U256,
        proof: &[Hash],
    ) -> Result<TxHash, LedgerError> {
        let mut inner = self.inner.lock();
        let paid = inner
            .contract
            .claim_tokens(claimant, cumulative_amount, proof)
            .map_err(rejected)?;
        let amount = amount_to_word(&cumulative_amount);
        let tx = next_tx_hash(
            &mut inner,
            &[b"claimTokens".as_slice(), claimant.as_bytes().as_slice(), amount.as_slice()],
        );
        tracing::debug!(tx = %tx, account = %claimant, %paid, "memory ledger claim");
        Ok(tx)
    }
}
