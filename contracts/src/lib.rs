//! # Airdrop Distribution Contracts
//!
//! The ledger side of a cumulative Merkle airdrop, in memory:
//!
//! - **Merkle Distributor**: owner-gated root updates, proof-checked
//!   cumulative claims, per-account claimed totals and credited balances.
//! - **Memory Ledger**: wraps a distributor behind a lock and implements
//!   the protocol's `Ledger` trait, so the node's devnet mode and the test
//!   suites can drive real claims without a chain.
//!
//! ## Design Principles
//!
//! 1. All monetary operations check for overflow. `U256` wraps silently
//!    with plain `+`, so every credit goes through `checked_add`.
//! 2. The leaf is always rebuilt from the caller's address. A claim never
//!    names its beneficiary.
//! 3. Every state change appends an event, the way a contract emits logs.

pub mod memory_ledger;
pub mod merkle_distributor;

pub use memory_ledger::MemoryLedger;
pub use merkle_distributor::{DistributorError, DistributorEvent, MerkleDistributor};
