//! # Merkle Module: Distribution Trees
//!
//! Generation side of the airdrop: allocations go in, a root and one proof
//! per allocation come out.
//!
//! ## Architecture
//!
//! ```text
//! leaf.rs: Allocation type, ABI leaf encoding, double Keccak leaf digest
//! tree.rs: Sorted-pair hashing, odd-node carry, level-wise builder, lookup
//! proof.rs: Sibling paths and standalone verification
//! dump.rs: "standard-v1" JSON format, structural parse, atomic save/load
//! ```
//!
//! ## Compatibility
//!
//! The leaf layout and the pair hash match what the distribution contract
//! recomputes on claim. Anything that changes a digest here changes every
//! root, and a root that the contract cannot reproduce locks the tokens.

pub mod dump;
pub mod leaf;
pub mod proof;
pub mod tree;

pub use dump::{Dump, DumpValue};
pub use leaf::{
    encode_leaf, hash_leaf, leaf_hash, parse_allocations, Allocation, AllocationInput, Leaf,
};
pub use proof::{process_proof, proof_from_levels, verify};
pub use tree::{build_levels, hash_pair, level_sizes, next_level, MerkleTree};
