//! Handle to a mounted namespace.

use std::fs;
use std::path::{Component, Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::mount::error::{MountError, MountResult};
use crate::types::RepoId;

/// A live namespace directory bound to one repository.
///
/// Borrowed from a [`MountGuard`](crate::mount::MountGuard); every operation
/// first checks that the binding still exists, so a handle that survived an
/// unmount is rejected instead of touching another mount's files.
#[derive(Debug)]
pub struct Namespace {
    id: RepoId,
    path: PathBuf,
    generation: u64,
    live: Arc<AtomicBool>,
}

impl Namespace {
    pub(crate) fn new(id: RepoId, path: PathBuf, generation: u64, live: Arc<AtomicBool>) -> Self {
        Self {
            id,
            path,
            generation,
            live,
        }
    }

    /// repository this namespace belongs to
    pub fn id(&self) -> RepoId {
        self.id
    }

    /// absolute path of the namespace root
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub(crate) fn generation(&self) -> u64 {
        self.generation
    }

    /// check whether the binding is still live
    pub fn is_mounted(&self) -> bool {
        self.live.load(Ordering::SeqCst)
    }

    /// fail with `NotMounted` if the binding is gone
    pub fn ensure_mounted(&self) -> MountResult<()> {
        if self.is_mounted() {
            Ok(())
        } else {
            Err(MountError::NotMounted(self.id))
        }
    }

    /// Join a relative path onto the namespace root.
    ///
    /// Only plain components are accepted: no `..`, no root, no prefix.
    pub fn resolve(&self, relative: impl AsRef<Path>) -> MountResult<PathBuf> {
        let relative = relative.as_ref();
        let plain = relative.components().next().is_some()
            && relative
                .components()
                .all(|c| matches!(c, Component::Normal(_)));
        if !plain {
            return Err(MountError::InvalidPath(relative.to_path_buf()));
        }
        Ok(self.path.join(relative))
    }

    /// Write a file inside the namespace, creating parent directories.
    pub fn write_file(&self, relative: impl AsRef<Path>, contents: &[u8]) -> MountResult<()> {
        self.ensure_mounted()?;
        let path = self.resolve(relative)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| MountError::io(parent, e))?;
        }
        fs::write(&path, contents).map_err(|e| MountError::io(&path, e))
    }

    /// Read a file inside the namespace.
    pub fn read_file(&self, relative: impl AsRef<Path>) -> MountResult<Vec<u8>> {
        self.ensure_mounted()?;
        let path = self.resolve(relative)?;
        fs::read(&path).map_err(|e| MountError::io(&path, e))
    }
}
