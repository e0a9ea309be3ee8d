//! # Hashing Utilities
//!
//! Keccak-256 helpers. Note that Keccak-256 is *not* NIST SHA3-256: the EVM
//! froze the pre-standard padding, and so do we. Using `Sha3_256` here would
//! produce perfectly valid hashes that no contract will ever accept.

use sha3::{Digest, Keccak256};

/// A 32-byte Keccak-256 digest: leaves, internal nodes and roots.
pub type Hash = [u8; 32];

/// Compute the Keccak-256 hash of the input data.
///
/// # Example
///
/// ```
/// use airdrop_protocol::crypto::keccak256;
///
/// let hash = keccak256(b"");
/// assert_eq!(
///     hex::encode(hash),
///     "c5d2460186f7233c927e7db2dcc703c0e500b653ca82273b7bfad8045d85a470"
/// );
/// ```
pub fn keccak256(data: &[u8]) -> Hash {
    Keccak256::digest(data).into()
}

/// Hash multiple byte slices as if they were concatenated, without
/// allocating the concatenation.
pub fn keccak256_multi(parts: &[&[u8]]) -> Hash {
    let mut hasher = Keccak256::new();
    for part in parts {
        hasher.update(part);
    }
    hasher.finalize().into()
}
