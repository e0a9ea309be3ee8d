//! # Tree Builder
//!
//! A binary Merkle tree stored as a list of levels:
//!
//! ```text
//! level 2:            root = H(H(a,b), c)
//!                    /                  \
//! level 1:     H(a,b)                    c      <- carried, not duplicated
//!             /      \                   |
//! level 0:   a        b                  c
//! ```
//!
//! Two rules make the root interoperable with the contract and with every
//! tree published so far, and both are deliberately kept out of the build
//! loop as standalone functions:
//!
//! - [`hash_pair`] sorts its inputs before hashing, so a verifier does not
//!   need to know whether a sibling sat on the left or the right.
//! - [`next_level`] carries an unpaired final node up unchanged. Duplicating
//!   it (the Bitcoin rule) yields a different root and makes `[a, b, c]` and
//!   `[a, b, c, c]` collide.
//!
//! Leaves stay in caller order; the position of an allocation in the input
//! is its `treeIndex`.

use crate::crypto::{keccak256_multi, Hash};
use crate::error::{AirdropError, Result};
use crate::merkle::leaf::{leaf_hash, parse_allocations, Allocation, AllocationInput};
use crate::types::{hash_to_hex, Address};

/// Hash two nodes into their parent, smaller digest first.
pub fn hash_pair(a: &Hash, b: &Hash) -> Hash {
    if a <= b {
        keccak256_multi(&[a.as_slice(), b.as_slice()])
    } else {
        keccak256_multi(&[b.as_slice(), a.as_slice()])
    }
}

/// Combine one level into the next: adjacent pairs left to right, with an
/// odd trailing node carried up unchanged.
pub fn next_level(level: &[Hash]) -> Vec<Hash> {
    level
        .chunks(2)
        .map(|pair| match pair {
            [left, right] => hash_pair(left, right),
            _ => pair[0],
        })
        .collect()
}

/// Number of nodes on each level of a tree with `leaf_count` leaves,
/// leaves first, root last. Empty for zero leaves.
pub fn level_sizes(leaf_count: usize) -> Vec<usize> {
    let mut sizes = Vec::new();
    let mut n = leaf_count;
    while n > 0 {
        sizes.push(n);
        if n == 1 {
            break;
        }
        n = (n + 1) / 2;
    }
    sizes
}

/// Build every level from the leaf digests up to the root.
pub fn build_levels(leaves: Vec<Hash>) -> Vec<Vec<Hash>> {
    if leaves.is_empty() {
        return Vec::new();
    }
    let mut levels = vec![leaves];
    while let Some(top) = levels.last() {
        if top.len() <= 1 {
            break;
        }
        let next = next_level(top);
        levels.push(next);
    }
    levels
}

/// A built distribution: the allocations and every node above them.
///
/// Immutable once built. Shared between tasks through `Arc`; all accessors
/// take `&self` and none of them lock.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MerkleTree {
    allocations: Vec<Allocation>,
    levels: Vec<Vec<Hash>>,
}

impl MerkleTree {
    /// Hash every allocation and build the tree.
    ///
    /// Fails with [`AirdropError::EmptyTree`] for an empty list. Duplicate
    /// allocations are legal and simply produce duplicate leaves.
    pub fn build(allocations: Vec<Allocation>) -> Result<Self> {
        if allocations.is_empty() {
            return Err(AirdropError::EmptyTree);
        }
        let leaves = allocations.iter().map(leaf_hash).collect();
        let levels = build_levels(leaves);
        let tree = Self {
            allocations,
            levels,
        };

        tracing::debug!(
            leaves = tree.len(),
            depth = tree.depth(),
            root = %tree.root_hex(),
            "merkle tree built"
        );
        Ok(tree)
    }

    /// Validate raw string allocations and build.
    ///
    /// The whole batch is checked before anything is hashed; the first bad
    /// entry rejects everything.
    pub fn from_strings(inputs: &[AllocationInput]) -> Result<Self> {
        Self::build(parse_allocations(inputs)?)
    }

    /// Assemble a tree from precomputed levels without rehashing.
    ///
    /// The caller guarantees the shape matches [`level_sizes`]; the dump
    /// parser checks that before calling.
    pub(crate) fn from_parts(allocations: Vec<Allocation>, levels: Vec<Vec<Hash>>) -> Self {
        Self {
            allocations,
            levels,
        }
    }

    /// The root digest.
    pub fn root(&self) -> Hash {
        // Construction guarantees at least one level with exactly one node on top.
        self.levels
            .last()
            .and_then(|top| top.first())
            .copied()
            .unwrap_or_default()
    }

    /// The root as `0x`-prefixed hex.
    pub fn root_hex(&self) -> String {
        hash_to_hex(&self.root())
    }

    /// Number of leaves.
    pub fn len(&self) -> usize {
        self.allocations.len()
    }

    /// Always `false` for a built tree; present for API symmetry with `len`.
    pub fn is_empty(&self) -> bool {
        self.allocations.is_empty()
    }

    /// Number of hashing levels above the leaves (0 for a single leaf).
    pub fn depth(&self) -> usize {
        self.levels.len().saturating_sub(1)
    }

    /// All levels, leaves first.
    pub fn levels(&self) -> &[Vec<Hash>] {
        &self.levels
    }

    /// All allocations in tree order.
    pub fn allocations(&self) -> &[Allocation] {
        &self.allocations
    }

    /// The allocation at `index`.
    pub fn allocation(&self, index: usize) -> Result<&Allocation> {
        self.allocations
            .get(index)
            .ok_or(AirdropError::IndexOutOfRange {
                index,
                len: self.len(),
            })
    }

    /// The leaf digest at `index`, as stored (not recomputed).
    pub fn leaf_hash(&self, index: usize) -> Result<Hash> {
        self.levels
            .first()
            .and_then(|leaves| leaves.get(index))
            .copied()
            .ok_or(AirdropError::IndexOutOfRange {
                index,
                len: self.len(),
            })
    }

    /// Every tree index whose allocation belongs to `address`.
    pub fn find_all(&self, address: &Address) -> Vec<usize> {
        self.allocations
            .iter()
            .enumerate()
            .filter(|(_, a)| a.address == *address)
            .map(|(i, _)| i)
            .collect()
    }

    /// The unique tree index for `address`.
    ///
    /// Refuses to pick when the address has several allocations: summing
    /// or choosing one would silently change what the holder can claim.
    pub fn find(&self, address: &Address) -> Result<usize> {
        let indices = self.find_all(address);
        match indices.len() {
            0 => Err(AirdropError::NotFound {
                address: address.to_hex(),
            }),
            1 => Ok(indices[0]),
            _ => Err(AirdropError::AmbiguousAllocation {
                address: address.to_hex(),
                indices,
            }),
        }
    }

    /// Recompute every digest and check it against the stored tree.
    ///
    /// Building never needs this. It exists for trees loaded from a dump,
    /// which are trusted structurally but not rehashed on load.
    pub fn validate(&self) -> Result<()> {
        let leaves = self.levels.first().ok_or(AirdropError::EmptyTree)?;
        for (index, allocation) in self.allocations.iter().enumerate() {
            if leaf_hash(allocation) != leaves[index] {
                return Err(AirdropError::CorruptDump(format!(
                    "leaf #{} digest does not match its value",
                    index
                )));
            }
        }
        for (depth, pair) in self.levels.windows(2).enumerate() {
            if next_level(&pair[0]) != pair[1] {
                return Err(AirdropError::CorruptDump(format!(
                    "level {} does not hash to level {}",
                    depth,
                    depth + 1
                )));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::keccak256;
    use crate::types::U256;

    fn alloc(byte: u8, amount: u64) -> Allocation {
        Allocation::new(Address::from_bytes([byte; 20]), U256::from(amount))
    }

    #[test]
    fn test_hash_pair_is_order_independent() {
        let a = keccak256(b"a");
        let b = keccak256(b"b");
        assert_eq!(hash_pair(&a, &b), hash_pair(&b, &a));
    }

    #[test]
    fn test_hash_pair_sorts_before_hashing() {
        let low = [0x01; 32];
        let high = [0xfe; 32];
        let mut concat = Vec::new();
        concat.extend_from_slice(&low);
        concat.extend_from_slice(&high);
        assert_eq!(hash_pair(&high, &low), keccak256(&concat));
    }

    #[test]
    fn test_next_level_carries_odd_node() {
        let a = keccak256(b"a");
        let b = keccak256(b"b");
        let c = keccak256(b"c");
        let level = next_level(&[a, b, c]);
        assert_eq!(level, vec![hash_pair(&a, &b), c]);
        // Duplicating would have produced H(c, c) instead.
        assert_ne!(level[1], hash_pair(&c, &c));
    }

    #[test]
    fn test_next_level_even() {
        let nodes: Vec<Hash> = (0u8..4).map(|i| keccak256(&[i])).collect();
        let level = next_level(&nodes);
        assert_eq!(
            level,
            vec![
                hash_pair(&nodes[0], &nodes[1]),
                hash_pair(&nodes[2], &nodes[3])
            ]
        );
    }

    #[test]
    fn test_level_sizes() {
        assert!(level_sizes(0).is_empty());
        assert_eq!(level_sizes(1), vec![1]);
        assert_eq!(level_sizes(2), vec![2, 1]);
        assert_eq!(level_sizes(3), vec![3, 2, 1]);
        assert_eq!(level_sizes(5), vec![5, 3, 2, 1]);
        assert_eq!(level_sizes(8), vec![8, 4, 2, 1]);
    }

    #[test]
    fn test_three_leaf_root_by_hand() {
        let a = keccak256(b"a");
        let b = keccak256(b"b");
        let c = keccak256(b"c");
        let levels = build_levels(vec![a, b, c]);
        let expected = hash_pair(&hash_pair(&a, &b), &c);
        assert_eq!(levels.last().unwrap(), &vec![expected]);
    }

    #[test]
    fn test_five_leaf_root_by_hand() {
        let [a, b, c, d, e] = [b"a", b"b", b"c", b"d", b"e"].map(|s| keccak256(s));
        let levels = build_levels(vec![a, b, c, d, e]);
        // e rides up unchanged through two levels before meeting a sibling.
        let expected = hash_pair(&hash_pair(&hash_pair(&a, &b), &hash_pair(&c, &d)), &e);
        assert_eq!(levels.len(), 4);
        assert_eq!(levels[1][2], e);
        assert_eq!(levels[2][1], e);
        assert_eq!(levels[3], vec![expected]);
    }

    #[test]
    fn test_build_rejects_empty() {
        assert!(matches!(
            MerkleTree::build(vec![]),
            Err(AirdropError::EmptyTree)
        ));
    }

    #[test]
    fn test_single_leaf_root_is_leaf() {
        let tree = MerkleTree::build(vec![alloc(0x11, 5)]).unwrap();
        assert_eq!(tree.root(), leaf_hash(&alloc(0x11, 5)));
        assert_eq!(tree.depth(), 0);
    }

    #[test]
    fn test_build_deterministic() {
        let allocations: Vec<Allocation> = (1u8..=9).map(|i| alloc(i, i as u64 * 10)).collect();
        let a = MerkleTree::build(allocations.clone()).unwrap();
        let b = MerkleTree::build(allocations).unwrap();
        assert_eq!(a.root(), b.root());
        assert_eq!(a, b);
    }

    #[test]
    fn test_input_order_matters() {
        let a = MerkleTree::build(vec![alloc(1, 1), alloc(2, 2), alloc(3, 3)]).unwrap();
        let b = MerkleTree::build(vec![alloc(3, 3), alloc(2, 2), alloc(1, 1)]).unwrap();
        assert_ne!(a.root(), b.root());
    }

    #[test]
    fn test_find_unique_missing_and_ambiguous() {
        let tree =
            MerkleTree::build(vec![alloc(1, 10), alloc(2, 20), alloc(1, 30), alloc(3, 40)])
                .unwrap();
        assert_eq!(tree.find(&Address::from_bytes([2; 20])).unwrap(), 1);

        let missing = tree.find(&Address::from_bytes([9; 20])).unwrap_err();
        assert!(matches!(missing, AirdropError::NotFound { .. }));

        match tree.find(&Address::from_bytes([1; 20])).unwrap_err() {
            AirdropError::AmbiguousAllocation { indices, .. } => assert_eq!(indices, vec![0, 2]),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_duplicate_pairs_are_legal() {
        let tree = MerkleTree::build(vec![alloc(1, 10), alloc(1, 10)]).unwrap();
        assert_eq!(tree.leaf_hash(0).unwrap(), tree.leaf_hash(1).unwrap());
        assert_eq!(tree.len(), 2);
    }

    #[test]
    fn test_validate_accepts_built_tree() {
        let tree = MerkleTree::build((1u8..=6).map(|i| alloc(i, 1)).collect()).unwrap();
        tree.validate().unwrap();
    }

    #[test]
    fn test_validate_detects_tampered_node() {
        let tree = MerkleTree::build((1u8..=6).map(|i| alloc(i, 1)).collect()).unwrap();
        let mut levels = tree.levels().to_vec();
        levels[1][0][0] ^= 0xff;
        let tampered = MerkleTree::from_parts(tree.allocations().to_vec(), levels);
        assert!(matches!(
            tampered.validate(),
            Err(AirdropError::CorruptDump(_))
        ));
    }

    #[test]
    fn test_validate_detects_swapped_value() {
        let tree = MerkleTree::build(vec![alloc(1, 1), alloc(2, 2)]).unwrap();
        let mut allocations = tree.allocations().to_vec();
        allocations[0].amount = U256::from(1_000_000u64);
        let tampered = MerkleTree::from_parts(allocations, tree.levels().to_vec());
        let err = tampered.validate().unwrap_err();
        assert!(err.to_string().contains("leaf #0"));
    }

    #[test]
    fn test_from_strings_rejects_whole_batch() {
        let inputs = vec![
            AllocationInput::new("0x1111111111111111111111111111111111111111", "100"),
            AllocationInput::new("0x2222222222222222222222222222222222222222", "1.5"),
        ];
        match MerkleTree::from_strings(&inputs).unwrap_err() {
            AirdropError::InvalidAllocation { index, reason } => {
                assert_eq!(index, 1);
                assert!(reason.contains("1.5"));
            }
            other => panic!("unexpected error: {other}"),
        }

        let tree = MerkleTree::from_strings(&inputs[..1]).unwrap();
        assert_eq!(tree.root(), leaf_hash(&alloc(0x11, 100)));
    }

    // Reference digests computed outside this crate with an independent
    // Keccak-256 over the ABI encoding. A change here breaks every
    // published root and every proof the contract has already accepted.
    const LEAF_0X11_1000: &str =
        "0xf62c10519787ef50d0b8b94ab8a951f39f74c5768c245b60a8c8b2a4880bb239";
    const LEAF_0X22_2000: &str =
        "0xbef16705905aff17a0b71e18019dfe4de2ba99880a95fe606a71035e2c12d6b8";
    const LEAF_0X33_3000: &str =
        "0x3d5e3c23efa551be80627fb3dfb7a8f8d04253e096d3793fe9ebbc10e279c4ef";
    const PAIR_0_1: &str = "0xec2132c71f58781e50a3f842aa2c3b7d3b1671d49963989a583c30432890a138";
    const ROOT_3: &str = "0x20b3187728a71479b0b42c32b125422ccc85c09155fd6aebb29028a33061d377";
    const ROOT_5: &str = "0x1b60dfd94039618d7fe89ac85e1861b3e8542d3e9bb663bc6e18c00ba52ed3a2";

    #[test]
    fn test_golden_three_leaf_tree() {
        let tree = MerkleTree::build(vec![
            alloc(0x11, 1000),
            alloc(0x22, 2000),
            alloc(0x33, 3000),
        ])
        .unwrap();

        assert_eq!(hash_to_hex(&tree.leaf_hash(0).unwrap()), LEAF_0X11_1000);
        assert_eq!(hash_to_hex(&tree.leaf_hash(1).unwrap()), LEAF_0X22_2000);
        assert_eq!(hash_to_hex(&tree.leaf_hash(2).unwrap()), LEAF_0X33_3000);
        assert_eq!(hash_to_hex(&tree.levels()[1][0]), PAIR_0_1);
        assert_eq!(tree.root_hex(), ROOT_3);

        assert_eq!(tree.proof_hex(2).unwrap(), vec![PAIR_0_1.to_string()]);
        assert_eq!(
            tree.proof_hex(0).unwrap(),
            vec![LEAF_0X22_2000.to_string(), LEAF_0X33_3000.to_string()]
        );
    }

    #[test]
    fn test_golden_five_leaf_root() {
        let tree = MerkleTree::build(vec![
            alloc(0x11, 1000),
            alloc(0x22, 2000),
            alloc(0x33, 3000),
            alloc(0x44, 4000),
            alloc(0x55, 5000),
        ])
        .unwrap();
        assert_eq!(tree.root_hex(), ROOT_5);
    }

    #[test]
    fn test_index_out_of_range() {
        let tree = MerkleTree::build(vec![alloc(1, 1)]).unwrap();
        assert!(matches!(
            tree.allocation(1),
            Err(AirdropError::IndexOutOfRange { index: 1, len: 1 })
        ));
        assert!(tree.leaf_hash(7).is_err());
    }
}
