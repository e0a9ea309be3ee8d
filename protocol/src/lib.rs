// Copyright (c) 2026 ALAS Technology. MIT License.
// See LICENSE for details.

//! # Airdrop Protocol: Core Library
//!
//! Off-chain half of a cumulative Merkle airdrop. An operator commits every
//! recipient's lifetime entitlement to a single 32-byte root, publishes the
//! root on-chain, and hands each recipient a short proof. Recipients then
//! unlock whatever part of their entitlement they have not claimed yet.
//!
//! Trees and proofs are byte-compatible with the OpenZeppelin
//! `MerkleProof` verifier: leaves are `keccak256(keccak256(abi.encode(
//! address, uint256)))` and parents hash their children in sorted order.
//!
//! ## Architecture
//!
//! - **merkle**: Leaf codec, tree builder, proof engine, dump format.
//! - **claim**: Ledger trait, cumulative claim reconciler, root publication.
//! - **connectivity**: Account/chain observer hub for wallet sessions.
//! - **crypto**: Keccak-256.
//! - **types**: Address, amount and digest parsing.
//! - **config**: Format constants, chain parameters, node defaults.
//! - **error**: The crate-wide error type and its classification.
//!
//! ## Ground Rules
//!
//! 1. Building a tree and deriving a proof are pure and synchronous. Only
//!    ledger calls are `async`.
//! 2. Amounts are cumulative. The ledger is always sent the total.
//! 3. A ledger write is not trusted until a read-back confirms it.
//! 4. Input is validated before anything is hashed or sent.

pub mod claim;
pub mod config;
pub mod connectivity;
pub mod crypto;
pub mod error;
pub mod merkle;
pub mod types;

pub use claim::{publish_root, ClaimReceipt, ClaimReconciler, ClaimState, Ledger, LedgerError, RootUpdate, TxHash};
pub use error::{AirdropError, ErrorKind, Result};
pub use merkle::{Allocation, AllocationInput, Dump, DumpValue, MerkleTree};
pub use types::{Address, U256};
