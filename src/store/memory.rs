//! In-memory object store.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;

use crate::store::error::StoreResult;
use crate::store::{validate_key, ObjectStore};

/// Object store kept in process memory; clones share the same map.
#[derive(Debug, Clone, Default)]
pub struct MemoryObjectStore {
    objects: Arc<RwLock<HashMap<String, Vec<u8>>>>,
}

impl MemoryObjectStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// number of stored objects
    pub fn len(&self) -> usize {
        self.objects.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.read().is_empty()
    }
}

impl ObjectStore for MemoryObjectStore {
    fn get(&self, key: &str) -> StoreResult<Option<Vec<u8>>> {
        validate_key(key)?;
        Ok(self.objects.read().get(key).cloned())
    }

    fn set(&self, key: &str, value: &[u8]) -> StoreResult<()> {
        validate_key(key)?;
        self.objects.write().insert(key.to_string(), value.to_vec());
        Ok(())
    }
}
