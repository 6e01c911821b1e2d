//! How a filesystem tree is laid out in blocks.
//!
//! ```text
//! block 0        inode of the root directory
//! inode block    {"kind":"dir"|"file"|"symlink","mode":420,"data":<key>}
//! dir data       {"<entry name>": <inode key>, ...}   (sorted)
//! file data      raw file bytes
//! symlink data   link target
//! ```
//!
//! Every block is owned by exactly one inode. A store that references a
//! block twice is rejected, which also rules out directory cycles.

use std::collections::{BTreeMap, HashSet};

use serde::{Deserialize, Serialize};

use crate::block::error::{LayoutError, LayoutResult};
use crate::block::store::{BlockKey, BlockStore};

/// key of the root directory inode
pub const ROOT_INODE: BlockKey = 0;

/// kind of a filesystem node
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeKind {
    File,
    Dir,
    Symlink,
}

/// inode record stored in its own block
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Inode {
    pub kind: NodeKind,
    /// permission bits (`0o7777` mask)
    pub mode: u32,
    /// block holding the node content
    pub data: BlockKey,
}

/// directory content: entry name -> inode key
pub type DirListing = BTreeMap<String, BlockKey>;

/// check that a directory entry name stays inside its directory
pub fn is_valid_entry_name(name: &str) -> bool {
    !name.is_empty() && name != "." && name != ".." && !name.contains('/') && !name.contains('\0')
}

/// Decodes blocks of a store, tracking which blocks were already claimed.
pub(crate) struct BlockReader<'a> {
    store: &'a BlockStore,
    claimed: HashSet<BlockKey>,
}

impl<'a> BlockReader<'a> {
    pub fn new(store: &'a BlockStore) -> Self {
        Self {
            store,
            claimed: HashSet::new(),
        }
    }

    /// fetch a block, failing if it is missing or was already claimed
    fn claim(&mut self, key: BlockKey) -> LayoutResult<&'a [u8]> {
        let bytes = self.store.get(key).ok_or(LayoutError::MissingBlock(key))?;
        if !self.claimed.insert(key) {
            return Err(LayoutError::SharedBlock(key));
        }
        Ok(bytes)
    }

    pub fn inode(&mut self, key: BlockKey) -> LayoutResult<Inode> {
        let bytes = self.claim(key)?;
        serde_json::from_slice(bytes).map_err(|source| LayoutError::MalformedInode { key, source })
    }

    pub fn listing(&mut self, key: BlockKey) -> LayoutResult<DirListing> {
        let bytes = self.claim(key)?;
        let listing: DirListing = serde_json::from_slice(bytes)
            .map_err(|source| LayoutError::MalformedDirectory { key, source })?;

        if let Some(bad) = listing.keys().find(|name| !is_valid_entry_name(name)) {
            return Err(LayoutError::InvalidEntryName {
                dir: key,
                name: bad.clone(),
            });
        }
        Ok(listing)
    }

    pub fn data(&mut self, key: BlockKey) -> LayoutResult<&'a [u8]> {
        self.claim(key)
    }

    /// number of blocks never reached from the root
    pub fn unclaimed(&self) -> usize {
        self.store.len() - self.claimed.len()
    }
}

/// Builds a store, handing out keys sequentially from the root.
pub(crate) struct BlockWriter {
    store: BlockStore,
    next: BlockKey,
}

impl BlockWriter {
    pub fn new() -> Self {
        Self {
            store: BlockStore::new(),
            next: ROOT_INODE,
        }
    }

    /// reserve the next free key
    pub fn allocate(&mut self) -> BlockKey {
        let key = self.next;
        self.next += 1;
        key
    }

    pub fn put_data(&mut self, bytes: Vec<u8>) -> BlockKey {
        let key = self.allocate();
        self.store.set(key, bytes);
        key
    }

    pub fn put_listing(&mut self, listing: &DirListing) -> LayoutResult<BlockKey> {
        let bytes = serde_json::to_vec(listing)?;
        Ok(self.put_data(bytes))
    }

    /// write an inode into a key obtained from `allocate`
    pub fn put_inode(&mut self, key: BlockKey, inode: &Inode) -> LayoutResult<()> {
        let bytes = serde_json::to_vec(inode)?;
        self.store.set(key, bytes);
        Ok(())
    }

    pub fn finish(self) -> BlockStore {
        self.store
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_entry_names() {
        assert!(is_valid_entry_name("README.md"));
        assert!(is_valid_entry_name(".git"));
        assert!(!is_valid_entry_name(""));
        assert!(!is_valid_entry_name("."));
        assert!(!is_valid_entry_name(".."));
        assert!(!is_valid_entry_name("a/b"));
    }

    #[test]
    fn test_inode_encoding() {
        let inode = Inode {
            kind: NodeKind::Dir,
            mode: 0o755,
            data: 1,
        };
        let bytes = serde_json::to_vec(&inode).unwrap();
        assert_eq!(bytes, br#"{"kind":"dir","mode":493,"data":1}"#.to_vec());
    }

    #[test]
    fn test_reader_rejects_shared_block() {
        let mut writer = BlockWriter::new();
        let root = writer.allocate();
        let data = writer.put_data(b"hello".to_vec());
        writer
            .put_inode(root, &Inode { kind: NodeKind::File, mode: 0o644, data })
            .unwrap();
        let store = writer.finish();

        let mut reader = BlockReader::new(&store);
        reader.data(data).unwrap();
        assert!(matches!(reader.data(data), Err(LayoutError::SharedBlock(k)) if k == data));
    }

    #[test]
    fn test_reader_rejects_bad_entry_name() {
        let mut store = BlockStore::new();
        store.set(1, br#"{"..":2}"#.to_vec());

        let mut reader = BlockReader::new(&store);
        let result = reader.listing(1);
        assert!(matches!(result, Err(LayoutError::InvalidEntryName { dir: 1, .. })));
    }

    #[test]
    fn test_writer_allocates_root_first() {
        let mut writer = BlockWriter::new();
        assert_eq!(writer.allocate(), ROOT_INODE);
        assert_eq!(writer.allocate(), 1);
    }
}
