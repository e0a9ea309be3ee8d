//! # Leaf Codec
//!
//! Turns one `(address, cumulative amount)` pair into the bytes and the
//! digest the on-chain verifier expects:
//!
//! ```text
//! encoded = abi.encode(address, uint256)
//!         = 0x00 * 12 || address (20B) || amount (32B, big-endian)
//! leaf    = keccak256(keccak256(encoded))
//! ```
//!
//! The contract recomputes `keccak256(bytes.concat(keccak256(abi.encode(
//! msg.sender, totalAllocation))))`, so every byte of this layout is part of
//! the compatibility contract. Hashing twice also keeps a 64-byte leaf
//! preimage from ever being mistaken for an internal node (which is the hash
//! of two concatenated 32-byte digests).

use serde::{Deserialize, Serialize};

use crate::config::{ABI_WORD_LENGTH, ADDRESS_LENGTH, ENCODED_LEAF_LENGTH};
use crate::crypto::{keccak256, Hash};
use crate::error::{AirdropError, Result};
use crate::types::{amount_to_word, parse_amount, Address, U256};

/// One recipient's *cumulative* lifetime entitlement.
///
/// Not an increment: a recipient who was allocated 100 and later 50 more
/// appears in the next tree with 150. Claims always reference this total.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Allocation {
    /// Recipient account.
    pub address: Address,
    /// Cumulative entitlement in the token's smallest unit.
    #[serde(with = "crate::types::decimal")]
    pub amount: U256,
}

impl Allocation {
    pub fn new(address: Address, amount: U256) -> Self {
        Self { address, amount }
    }

    /// Parse the textual form used by allocation requests and dumps.
    pub fn parse(address: &str, amount: &str) -> Result<Self> {
        Ok(Self {
            address: Address::parse(address)?,
            amount: parse_amount(amount)?,
        })
    }

    /// The `[address, amount]` pair as it appears in a dump.
    pub fn to_value(&self) -> [String; 2] {
        [self.address.to_hex(), self.amount.to_string()]
    }
}

/// Raw allocation as received from a caller, before validation.
///
/// Missing fields deserialize as empty strings so they fail validation
/// with the entry's index instead of failing JSON decoding.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AllocationInput {
    #[serde(default)]
    pub address: String,
    #[serde(default)]
    pub amount: String,
}

impl AllocationInput {
    pub fn new(address: impl Into<String>, amount: impl Into<String>) -> Self {
        Self {
            address: address.into(),
            amount: amount.into(),
        }
    }
}

/// Validate a whole batch. The first malformed entry rejects everything,
/// and the error names its position so the caller can fix it.
pub fn parse_allocations(inputs: &[AllocationInput]) -> Result<Vec<Allocation>> {
    inputs
        .iter()
        .enumerate()
        .map(|(index, input)| {
            Allocation::parse(&input.address, &input.amount).map_err(|e| {
                AirdropError::InvalidAllocation {
                    index,
                    reason: e.to_string(),
                }
            })
        })
        .collect()
}

/// ABI-encode an allocation as `(address, uint256)`.
pub fn encode_leaf(allocation: &Allocation) -> [u8; ENCODED_LEAF_LENGTH] {
    let mut encoded = [0u8; ENCODED_LEAF_LENGTH];
    // Addresses are left-padded to a full word.
    encoded[ABI_WORD_LENGTH - ADDRESS_LENGTH..ABI_WORD_LENGTH]
        .copy_from_slice(allocation.address.as_bytes());
    encoded[ABI_WORD_LENGTH..].copy_from_slice(&amount_to_word(&allocation.amount));
    encoded
}

/// Double Keccak-256 of an encoded leaf.
pub fn hash_leaf(encoded: &[u8]) -> Hash {
    keccak256(&keccak256(encoded))
}

/// Leaf digest of an allocation, i.e. `hash_leaf(encode_leaf(allocation))`.
pub fn leaf_hash(allocation: &Allocation) -> Hash {
    hash_leaf(&encode_leaf(allocation))
}

/// An encoded leaf together with its digest.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Leaf {
    pub encoded: [u8; ENCODED_LEAF_LENGTH],
    pub digest: Hash,
}

impl Leaf {
    pub fn new(allocation: &Allocation) -> Self {
        let encoded = encode_leaf(allocation);
        let digest = hash_leaf(&encoded);
        Self { encoded, digest }
    }
}
