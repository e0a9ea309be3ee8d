//! # Cryptographic Primitives
//!
//! Everything that hashes flows through here. The distribution format is
//! defined in terms of Keccak-256, the hash the EVM exposes natively, so the
//! on-chain verifier can recompute every digest we produce.
//!
//! Nothing here is clever. It is a thin, typed wrapper around the `sha3`
//! crate so the rest of the code never touches a hasher directly.

pub mod hash;

pub use hash::{keccak256, keccak256_multi, Hash};
