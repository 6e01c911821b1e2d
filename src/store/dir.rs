//! Directory backed object store.

use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use tempfile::NamedTempFile;
use tracing::debug;

use crate::store::error::{StoreError, StoreResult};
use crate::store::{validate_key, ObjectStore};

/// Stores each object as one file below a root directory.
///
/// Key segments map to path components. Writes go through a temporary file
/// in the target directory followed by a rename, so a reader sees either
/// the old or the new value, never a torn one.
#[derive(Debug, Clone)]
pub struct DirObjectStore {
    root: PathBuf,
}

impl DirObjectStore {
    /// open a store rooted at `root`, creating the directory if needed
    pub fn open(root: impl Into<PathBuf>) -> StoreResult<Self> {
        let root = root.into();
        fs::create_dir_all(&root).map_err(|e| StoreError::io(&root, e))?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn object_path(&self, key: &str) -> StoreResult<PathBuf> {
        validate_key(key)?;
        Ok(key.split('/').fold(self.root.clone(), |path, segment| path.join(segment)))
    }
}

impl ObjectStore for DirObjectStore {
    fn get(&self, key: &str) -> StoreResult<Option<Vec<u8>>> {
        let path = self.object_path(key)?;
        match fs::read(&path) {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(StoreError::io(path, e)),
        }
    }

    fn set(&self, key: &str, value: &[u8]) -> StoreResult<()> {
        let path = self.object_path(key)?;
        let parent = path.parent().unwrap_or(&self.root);
        fs::create_dir_all(parent).map_err(|e| StoreError::io(parent, e))?;

        let mut file = NamedTempFile::new_in(parent).map_err(|e| StoreError::io(parent, e))?;
        file.write_all(value)
            .and_then(|_| file.as_file().sync_all())
            .map_err(|e| StoreError::io(file.path(), e))?;
        file.persist(&path)
            .map_err(|e| StoreError::io(&path, e.error))?;

        debug!(key, bytes = value.len(), "object stored");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn setup() -> (TempDir, DirObjectStore) {
        let dir = TempDir::new().unwrap();
        let store = DirObjectStore::open(dir.path().join("state")).unwrap();
        (dir, store)
    }

    #[test]
    fn test_missing_key_is_none() {
        let (_dir, store) = setup();
        assert_eq!(store.get("repo/nothing").unwrap(), None);
    }

    #[test]
    fn test_nested_keys_become_directories() {
        let (_dir, store) = setup();
        store.set("repo/abc", b"payload").unwrap();

        assert!(store.root().join("repo").join("abc").is_file());
        assert_eq!(store.get("repo/abc").unwrap().as_deref(), Some(&b"payload"[..]));
    }

    #[test]
    fn test_overwrite_replaces_value() {
        let (_dir, store) = setup();
        store.set("repo-index", b"first, and longer").unwrap();
        store.set("repo-index", b"second").unwrap();
        assert_eq!(store.get("repo-index").unwrap().as_deref(), Some(&b"second"[..]));

        // no temp files left next to the object
        let leftovers = fs::read_dir(store.root()).unwrap().count();
        assert_eq!(leftovers, 1);
    }

    #[test]
    fn test_reopen_sees_previous_writes() {
        let (dir, store) = setup();
        store.set("repo/x", b"1").unwrap();

        let reopened = DirObjectStore::open(dir.path().join("state")).unwrap();
        assert_eq!(reopened.get("repo/x").unwrap().as_deref(), Some(&b"1"[..]));
    }

    #[test]
    fn test_rejects_escaping_key() {
        let (_dir, store) = setup();
        assert!(matches!(store.get("../etc"), Err(StoreError::InvalidKey(_))));
    }
}
