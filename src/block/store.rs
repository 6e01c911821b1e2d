//! In-memory block store.
//!
//! A `BlockStore` is the whole content of one repository's filesystem:
//! every inode, directory listing and file body lives in one block.
//! Keys are assigned by the layout layer, never by callers of this type.

use std::collections::BTreeMap;

/// key of one block
pub type BlockKey = u64;

/// Mapping from block key to block bytes.
///
/// Backed by a `BTreeMap` so `entries()` is ordered by key, which keeps
/// serialization deterministic.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BlockStore {
    blocks: BTreeMap<BlockKey, Vec<u8>>,
}

impl BlockStore {
    /// create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// get the bytes stored under `key`
    pub fn get(&self, key: BlockKey) -> Option<&[u8]> {
        self.blocks.get(&key).map(Vec::as_slice)
    }

    /// store `value` under `key`, returning the previous value if any
    pub fn set(&mut self, key: BlockKey, value: impl Into<Vec<u8>>) -> Option<Vec<u8>> {
        self.blocks.insert(key, value.into())
    }

    /// remove a block
    pub fn remove(&mut self, key: BlockKey) -> Option<Vec<u8>> {
        self.blocks.remove(&key)
    }

    /// check if a block exists
    pub fn contains(&self, key: BlockKey) -> bool {
        self.blocks.contains_key(&key)
    }

    /// iterate over all blocks in key order
    pub fn entries(&self) -> impl ExactSizeIterator<Item = (BlockKey, &[u8])> + '_ {
        self.blocks.iter().map(|(key, value)| (*key, value.as_slice()))
    }

    /// number of blocks
    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    /// total size of all block values in bytes
    pub fn byte_size(&self) -> usize {
        self.blocks.values().map(Vec::len).sum()
    }
}

impl FromIterator<(BlockKey, Vec<u8>)> for BlockStore {
    fn from_iter<I: IntoIterator<Item = (BlockKey, Vec<u8>)>>(iter: I) -> Self {
        Self {
            blocks: iter.into_iter().collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_get_set() {
        let mut store = BlockStore::new();
        assert!(store.is_empty());
        assert_eq!(store.get(7), None);

        assert_eq!(store.set(7, b"seven".to_vec()), None);
        assert_eq!(store.get(7), Some(&b"seven"[..]));
        assert!(store.contains(7));

        // overwrite returns previous value
        assert_eq!(store.set(7, b"again".to_vec()), Some(b"seven".to_vec()));
        assert_eq!(store.len(), 1);

        assert_eq!(store.remove(7), Some(b"again".to_vec()));
        assert!(store.is_empty());
    }

    #[test]
    fn test_entries_ordered_by_key() {
        let mut store = BlockStore::new();
        store.set(u64::MAX, vec![3]);
        store.set(0, vec![1]);
        store.set(42, vec![2]);

        let keys: Vec<BlockKey> = store.entries().map(|(k, _)| k).collect();
        assert_eq!(keys, vec![0, 42, u64::MAX]);
        assert_eq!(store.byte_size(), 3);
    }

    #[test]
    fn test_from_iter() {
        let store: BlockStore = vec![(1, vec![1u8]), (2, vec![])].into_iter().collect();
        assert_eq!(store.len(), 2);
        assert_eq!(store.get(2), Some(&[][..]));
    }
}
