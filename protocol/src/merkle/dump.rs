//! # Distribution Serializer
//!
//! A dump is everything a claimant (or an auditor) needs, with no rebuild:
//!
//! ```json
//! {
//!   "format": "standard-v1",
//!   "leafEncoding": ["address", "uint256"],
//!   "root": "0x…",
//!   "tree": ["0x<leaf 0>", "…", "0x<root>"],
//!   "values": [
//!     { "value": ["0x…", "1000"], "treeIndex": 0, "proof": ["0x…"] }
//!   ]
//! }
//! ```
//!
//! `tree` holds every node flattened level by level, leaves first and root
//! last. Level sizes follow from the number of values, so parsing restores
//! the levels without hashing anything. Parsing is structural only; call
//! [`MerkleTree::validate`] afterwards to rehash.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::config::{DUMP_FORMAT, LEAF_ENCODING};
use crate::crypto::Hash;
use crate::error::{AirdropError, Result};
use crate::merkle::leaf::Allocation;
use crate::merkle::proof::proof_from_levels;
use crate::merkle::tree::{level_sizes, MerkleTree};
use crate::types::{hash_to_hex, parse_hash, Address};

/// Serialized distribution.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Dump {
    pub format: String,
    pub leaf_encoding: Vec<String>,
    pub root: String,
    pub tree: Vec<String>,
    pub values: Vec<DumpValue>,
}

/// One allocation inside a dump.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DumpValue {
    /// `[address, decimal amount]`.
    pub value: [String; 2],
    pub tree_index: usize,
    pub proof: Vec<String>,
}

impl DumpValue {
    /// Parse the `[address, amount]` pair.
    pub fn allocation(&self) -> Result<Allocation> {
        Allocation::parse(&self.value[0], &self.value[1])
    }

    /// Parse the proof digests.
    pub fn proof_hashes(&self) -> Result<Vec<Hash>> {
        self.proof.iter().map(|p| parse_hash(p)).collect()
    }
}

impl Dump {
    pub fn to_json_pretty(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Write the dump to `path`.
    ///
    /// The JSON goes to a sibling temp file that is flushed and then renamed
    /// over the target, so a crash never leaves a half-written dump behind.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let json = self.to_json_pretty()?;
        let tmp = temp_path(path);

        let mut file = fs::File::create(&tmp)?;
        file.write_all(json.as_bytes())?;
        file.write_all(b"\n")?;
        file.sync_all()?;
        drop(file);

        if let Err(e) = fs::rename(&tmp, path) {
            let _ = fs::remove_file(&tmp);
            return Err(e.into());
        }
        tracing::debug!(path = %path.display(), values = self.values.len(), "dump saved");
        Ok(())
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let json = fs::read_to_string(path)?;
        Self::from_json(&json)
    }

    /// Locate the entry for `address` without rebuilding the tree.
    ///
    /// Address comparison goes through [`Address::parse`], so a dump written
    /// with checksummed addresses still matches a lowercase query.
    pub fn find(&self, address: &Address) -> Result<&DumpValue> {
        let mut matches = Vec::new();
        for entry in &self.values {
            if Address::parse(&entry.value[0])? == *address {
                matches.push(entry);
            }
        }
        match matches.len() {
            0 => Err(AirdropError::NotFound {
                address: address.to_hex(),
            }),
            1 => Ok(matches[0]),
            _ => Err(AirdropError::AmbiguousAllocation {
                address: address.to_hex(),
                indices: matches.iter().map(|m| m.tree_index).collect(),
            }),
        }
    }
}

fn temp_path(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(".tmp");
    path.with_file_name(name)
}

fn corrupt(reason: impl Into<String>) -> AirdropError {
    AirdropError::CorruptDump(reason.into())
}

impl MerkleTree {
    /// Serialize the tree. Values are listed in tree order.
    pub fn dump(&self) -> Dump {
        let values = self
            .allocations()
            .iter()
            .enumerate()
            .map(|(index, allocation)| DumpValue {
                value: allocation.to_value(),
                tree_index: index,
                proof: proof_from_levels(self.levels(), index)
                    .unwrap_or_default()
                    .iter()
                    .map(hash_to_hex)
                    .collect(),
            })
            .collect();

        Dump {
            format: DUMP_FORMAT.to_string(),
            leaf_encoding: LEAF_ENCODING.iter().map(|s| s.to_string()).collect(),
            root: self.root_hex(),
            tree: self.levels().iter().flatten().map(hash_to_hex).collect(),
            values,
        }
    }

    /// Rebuild a tree from a dump without rehashing.
    pub fn from_dump(dump: &Dump) -> Result<Self> {
        if dump.format != DUMP_FORMAT {
            return Err(AirdropError::UnsupportedFormat {
                found: dump.format.clone(),
            });
        }
        if dump.leaf_encoding.len() != LEAF_ENCODING.len()
            || dump
                .leaf_encoding
                .iter()
                .zip(LEAF_ENCODING.iter())
                .any(|(found, expected)| found != expected)
        {
            return Err(AirdropError::UnsupportedLeafEncoding(
                dump.leaf_encoding.clone(),
            ));
        }

        let leaf_count = dump.values.len();
        if leaf_count == 0 {
            return Err(AirdropError::EmptyTree);
        }
        let sizes = level_sizes(leaf_count);
        let expected_nodes: usize = sizes.iter().sum();
        if dump.tree.len() != expected_nodes {
            return Err(corrupt(format!(
                "{} values need {} tree nodes, found {}",
                leaf_count,
                expected_nodes,
                dump.tree.len()
            )));
        }

        let nodes = dump
            .tree
            .iter()
            .map(|n| parse_hash(n))
            .collect::<Result<Vec<Hash>>>()?;
        let mut levels = Vec::with_capacity(sizes.len());
        let mut offset = 0;
        for size in &sizes {
            levels.push(nodes[offset..offset + size].to_vec());
            offset += size;
        }

        let root = parse_hash(&dump.root)?;
        if nodes.last() != Some(&root) {
            return Err(corrupt("root does not match the top tree node"));
        }

        let mut slots: Vec<Option<Allocation>> = vec![None; leaf_count];
        for entry in &dump.values {
            let index = entry.tree_index;
            let slot = slots
                .get_mut(index)
                .ok_or_else(|| corrupt(format!("treeIndex {} out of range", index)))?;
            if slot.is_some() {
                return Err(corrupt(format!("treeIndex {} appears twice", index)));
            }
            *slot = Some(entry.allocation()?);

            let stored = entry.proof_hashes()?;
            let derived = proof_from_levels(&levels, index)
                .ok_or_else(|| corrupt(format!("no leaf slot for treeIndex {}", index)))?;
            if stored != derived {
                return Err(corrupt(format!(
                    "stored proof for treeIndex {} does not match the tree",
                    index
                )));
            }
        }

        // Every slot is filled: n distinct indices below n form a permutation.
        let allocations = slots.into_iter().flatten().collect::<Vec<_>>();
        if allocations.len() != leaf_count {
            return Err(corrupt("treeIndex values are not a permutation"));
        }

        Ok(MerkleTree::from_parts(allocations, levels))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::types::U256;

    fn alloc(byte: u8, amount: u64) -> Allocation {
        Allocation::new(Address::from_bytes([byte; 20]), U256::from(amount))
    }

    fn sample(n: u8) -> MerkleTree {
        MerkleTree::build((1..=n).map(|i| alloc(i, i as u64 * 100)).collect()).unwrap()
    }

    #[test]
    fn test_dump_shape() {
        let tree = sample(5);
        let dump = tree.dump();
        assert_eq!(dump.format, "standard-v1");
        assert_eq!(dump.leaf_encoding, vec!["address", "uint256"]);
        assert_eq!(dump.tree.len(), 5 + 3 + 2 + 1);
        assert_eq!(dump.tree.last().unwrap(), &dump.root);
        assert_eq!(dump.values[2].tree_index, 2);
        assert_eq!(dump.values[2].value[1], "300");

        let json: serde_json::Value = serde_json::from_str(&dump.to_json_pretty().unwrap()).unwrap();
        assert!(json.get("leafEncoding").is_some());
        assert!(json["values"][0].get("treeIndex").is_some());
    }

    #[test]
    fn test_roundtrip_preserves_root_and_proofs() {
        for n in [1u8, 2, 3, 5, 8, 13] {
            let tree = sample(n);
            let json = tree.dump().to_json_pretty().unwrap();
            let back = MerkleTree::from_dump(&Dump::from_json(&json).unwrap()).unwrap();
            assert_eq!(back.root(), tree.root());
            for i in 0..tree.len() {
                assert_eq!(back.proof(i).unwrap(), tree.proof(i).unwrap());
            }
            back.validate().unwrap();
        }
    }

    #[test]
    fn test_values_may_be_reordered() {
        let tree = sample(4);
        let mut dump = tree.dump();
        dump.values.reverse();
        let back = MerkleTree::from_dump(&dump).unwrap();
        assert_eq!(back, tree);
    }

    #[test]
    fn test_unknown_format_refused() {
        let mut dump = sample(3).dump();
        dump.format = "standard-v2".into();
        let err = MerkleTree::from_dump(&dump).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::FormatVersion);
    }

    #[test]
    fn test_unknown_leaf_encoding_refused() {
        let mut dump = sample(3).dump();
        dump.leaf_encoding = vec!["address".into(), "uint128".into()];
        assert!(matches!(
            MerkleTree::from_dump(&dump),
            Err(AirdropError::UnsupportedLeafEncoding(_))
        ));
    }

    #[test]
    fn test_corruption_detected() {
        let base = sample(5).dump();

        let mut missing_node = base.clone();
        missing_node.tree.pop();
        assert!(matches!(
            MerkleTree::from_dump(&missing_node),
            Err(AirdropError::CorruptDump(_))
        ));

        let mut wrong_root = base.clone();
        wrong_root.root = format!("0x{}", "00".repeat(32));
        assert!(matches!(
            MerkleTree::from_dump(&wrong_root),
            Err(AirdropError::CorruptDump(_))
        ));

        let mut duplicate_index = base.clone();
        duplicate_index.values[1].tree_index = 0;
        assert!(matches!(
            MerkleTree::from_dump(&duplicate_index),
            Err(AirdropError::CorruptDump(_))
        ));

        let mut out_of_range = base.clone();
        out_of_range.values[4].tree_index = 9;
        assert!(matches!(
            MerkleTree::from_dump(&out_of_range),
            Err(AirdropError::CorruptDump(_))
        ));

        let mut bad_proof = base.clone();
        bad_proof.values[0].proof.reverse();
        assert!(matches!(
            MerkleTree::from_dump(&bad_proof),
            Err(AirdropError::CorruptDump(_))
        ));
    }

    #[test]
    fn test_tampered_value_caught_by_validate_only() {
        let mut dump = sample(4).dump();
        dump.values[1].value[1] = "999999".into();
        // Structure is intact, so parsing succeeds.
        let tree = MerkleTree::from_dump(&dump).unwrap();
        assert!(matches!(tree.validate(), Err(AirdropError::CorruptDump(_))));
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("merkle-tree.json");
        let dump = sample(6).dump();
        dump.save(&path).unwrap();
        assert!(!dir.path().join("merkle-tree.json.tmp").exists());
        assert_eq!(Dump::load(&path).unwrap(), dump);
    }

    #[test]
    fn test_find_is_case_insensitive() {
        let mut dump = sample(3).dump();
        dump.values[1].value[0] = dump.values[1].value[0].to_uppercase().replacen("0X", "0x", 1);
        let entry = dump.find(&Address::from_bytes([2; 20])).unwrap();
        assert_eq!(entry.tree_index, 1);
        assert!(matches!(
            dump.find(&Address::from_bytes([7; 20])),
            Err(AirdropError::NotFound { .. })
        ));
    }

    #[test]
    fn test_find_ambiguous() {
        let tree = MerkleTree::build(vec![alloc(1, 1), alloc(2, 2), alloc(1, 3)]).unwrap();
        let dump = tree.dump();
        match dump.find(&Address::from_bytes([1; 20])).unwrap_err() {
            AirdropError::AmbiguousAllocation { indices, .. } => assert_eq!(indices, vec![0, 2]),
            other => panic!("unexpected error: {other}"),
        }
    }
}
