//! Durable key/value collaborator.
//!
//! Repositories are persisted as opaque byte values under string keys.
//! Only read-after-write consistency is expected from an implementation.

mod dir;
mod error;
mod memory;

pub use dir::DirObjectStore;
pub use error::{StoreError, StoreResult};
pub use memory::MemoryObjectStore;

/// A durable get/set store.
pub trait ObjectStore: Send + Sync {
    /// value stored under `key`, `None` if nothing was ever written
    fn get(&self, key: &str) -> StoreResult<Option<Vec<u8>>>;

    /// replace the value stored under `key`
    fn set(&self, key: &str, value: &[u8]) -> StoreResult<()>;
}

/// Check that a key is a `/`-separated list of plain segments.
///
/// Segments may hold ASCII alphanumerics, `-`, `_` and `.`, but may not be
/// `.` or `..`.
pub fn validate_key(key: &str) -> StoreResult<()> {
    let valid = !key.is_empty()
        && key.split('/').all(|segment| {
            !segment.is_empty()
                && segment != "."
                && segment != ".."
                && segment
                    .chars()
                    .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'))
        });

    if valid {
        Ok(())
    } else {
        Err(StoreError::InvalidKey(key.to_string()))
    }
}
