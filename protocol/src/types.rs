//! # Core Value Types
//!
//! Addresses, amounts and digests, with the textual forms used by the dump
//! format and the HTTP API:
//!
//! | Type      | Text form                         | Example              |
//! |-----------|-----------------------------------|----------------------|
//! | [`Address`] | `0x` + 40 hex digits            | `0x1111…1111`        |
//! | [`U256`]  | decimal digits, no sign           | `1000000000000000000`|
//! | [`Hash`]  | `0x` + 64 hex digits              | `0xc5d2…a470`        |
//!
//! Parsing is strict on purpose: these strings end up inside leaves, and a
//! lenient parser is how two implementations end up with different roots.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

pub use primitive_types::U256;

use crate::config::{ADDRESS_LENGTH, HASH_LENGTH};
use crate::crypto::Hash;
use crate::error::{AirdropError, Result};

// ---------------------------------------------------------------------------
// Address
// ---------------------------------------------------------------------------

/// A 20-byte account identifier.
///
/// Rendered as lowercase `0x`-prefixed hex. Input is case-insensitive, so
/// checksummed and plain forms of the same account compare equal.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct Address([u8; ADDRESS_LENGTH]);

impl Address {
    /// The all-zero address.
    pub const ZERO: Address = Address([0u8; ADDRESS_LENGTH]);

    /// Wrap raw address bytes.
    pub const fn from_bytes(bytes: [u8; ADDRESS_LENGTH]) -> Self {
        Self(bytes)
    }

    /// The raw 20 bytes.
    pub fn as_bytes(&self) -> &[u8; ADDRESS_LENGTH] {
        &self.0
    }

    /// Parse `0x` followed by exactly 40 hex digits.
    pub fn parse(s: &str) -> Result<Self> {
        let digits = s
            .strip_prefix("0x")
            .ok_or_else(|| AirdropError::InvalidAddress(s.to_string()))?;
        if digits.len() != 2 * ADDRESS_LENGTH || !digits.bytes().all(|b| b.is_ascii_hexdigit()) {
            return Err(AirdropError::InvalidAddress(s.to_string()));
        }
        let mut bytes = [0u8; ADDRESS_LENGTH];
        hex::decode_to_slice(digits, &mut bytes)
            .map_err(|_| AirdropError::InvalidAddress(s.to_string()))?;
        Ok(Self(bytes))
    }

    /// Lowercase `0x`-prefixed hex.
    pub fn to_hex(&self) -> String {
        format!("0x{}", hex::encode(self.0))
    }
}

impl FromStr for Address {
    type Err = AirdropError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl fmt::Debug for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Address({})", self.to_hex())
    }
}

impl Serialize for Address {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for Address {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Address::parse(&s).map_err(serde::de::Error::custom)
    }
}

// ---------------------------------------------------------------------------
// Amounts
// ---------------------------------------------------------------------------

/// Parse a non-negative decimal integer that fits in 256 bits.
///
/// Only ASCII digits are accepted: no sign, no decimal point, no exponent,
/// no surrounding whitespace. Leading zeros are fine.
pub fn parse_amount(s: &str) -> Result<U256> {
    if s.is_empty() || !s.bytes().all(|b| b.is_ascii_digit()) {
        return Err(AirdropError::InvalidAmount(s.to_string()));
    }
    U256::from_dec_str(s).map_err(|_| AirdropError::InvalidAmount(s.to_string()))
}

/// Serde adapter that writes a [`U256`] as a decimal string.
///
/// `primitive_types` would otherwise emit hex, which is not what the dump
/// format or any JSON consumer of amounts expects.
pub mod decimal {
    use super::{parse_amount, U256};
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &U256, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&value.to_string())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<U256, D::Error> {
        let s = String::deserialize(deserializer)?;
        parse_amount(&s).map_err(serde::de::Error::custom)
    }
}

/// Big-endian 32-byte representation of an amount (one ABI word).
pub fn amount_to_word(amount: &U256) -> [u8; 32] {
    let mut word = [0u8; 32];
    amount.to_big_endian(&mut word);
    word
}

// ---------------------------------------------------------------------------
// Digests
// ---------------------------------------------------------------------------

/// `0x`-prefixed lowercase hex of a digest.
pub fn hash_to_hex(hash: &Hash) -> String {
    format!("0x{}", hex::encode(hash))
}

fn decode_hash(s: &str) -> Option<Hash> {
    let digits = s.strip_prefix("0x")?;
    if digits.len() != 2 * HASH_LENGTH {
        return None;
    }
    let mut hash = [0u8; HASH_LENGTH];
    hex::decode_to_slice(digits, &mut hash).ok()?;
    Some(hash)
}

/// Parse a tree node or proof element.
pub fn parse_hash(s: &str) -> Result<Hash> {
    decode_hash(s).ok_or_else(|| AirdropError::InvalidHash(s.to_string()))
}

/// Parse a merkle root submitted for publication.
///
/// Same shape as [`parse_hash`] but reports [`AirdropError::InvalidRoot`],
/// which carries the user-facing wording for root submissions.
pub fn parse_root(s: &str) -> Result<Hash> {
    decode_hash(s).ok_or_else(|| AirdropError::InvalidRoot(s.to_string()))
}
