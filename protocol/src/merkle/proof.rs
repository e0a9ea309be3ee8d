//! # Proof Engine
//!
//! A proof is the list of sibling digests met while walking from a leaf up
//! to the root, bottom first. Because parents are built with the sorted
//! [`hash_pair`], the proof carries no left/right flags: a verifier simply
//! folds `hash_pair` over it.
//!
//! Carried nodes have no sibling on the level they skip, so proofs for
//! leaves near the end of an odd-sized tree can be shorter than
//! `ceil(log2(n))`. The proof length is the depth at that particular leaf.

use crate::crypto::Hash;
use crate::error::{AirdropError, Result};
use crate::merkle::leaf::{leaf_hash, Allocation};
use crate::merkle::tree::{hash_pair, MerkleTree};
use crate::types::hash_to_hex;

/// Sibling path for the leaf at `index`, or `None` if the index is not a leaf.
pub fn proof_from_levels(levels: &[Vec<Hash>], index: usize) -> Option<Vec<Hash>> {
    let leaves = levels.first()?;
    if index >= leaves.len() {
        return None;
    }

    let mut proof = Vec::with_capacity(levels.len().saturating_sub(1));
    let mut position = index;
    // The top level is the root; it has no sibling.
    for level in &levels[..levels.len() - 1] {
        let sibling = position ^ 1;
        if let Some(node) = level.get(sibling) {
            proof.push(*node);
        }
        position /= 2;
    }
    Some(proof)
}

/// Fold a proof over a leaf and return the implied root.
pub fn process_proof(leaf: &Hash, proof: &[Hash]) -> Hash {
    proof
        .iter()
        .fold(*leaf, |node, sibling| hash_pair(&node, sibling))
}

/// Check that `proof` connects `leaf` to `root`.
///
/// Needs nothing but the three inputs, which is what makes on-chain
/// verification possible with O(depth) calldata.
pub fn verify(leaf: &Hash, proof: &[Hash], root: &Hash) -> bool {
    process_proof(leaf, proof) == *root
}

impl MerkleTree {
    /// Proof for the leaf at `index`.
    pub fn proof(&self, index: usize) -> Result<Vec<Hash>> {
        proof_from_levels(self.levels(), index).ok_or(AirdropError::IndexOutOfRange {
            index,
            len: self.len(),
        })
    }

    /// Proof for the leaf at `index`, hex encoded as it appears in a dump.
    pub fn proof_hex(&self, index: usize) -> Result<Vec<String>> {
        Ok(self.proof(index)?.iter().map(hash_to_hex).collect())
    }

    /// Hash `allocation` and verify it against this tree's root.
    pub fn verify_allocation(&self, allocation: &Allocation, proof: &[Hash]) -> bool {
        verify(&leaf_hash(allocation), proof, &self.root())
    }
}
