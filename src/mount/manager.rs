//! Mount manager - binds repositories to namespace directories.
//!
//! The manager owns a scratch root. Mounting a repository reserves a slot
//! keyed by its id, materializes the block store into
//! `<root>/<prefix><id>`, and hands back a [`MountGuard`]. The slot is
//! released when the guard is unmounted or dropped, including on error
//! paths and unwinding. A forced [`MountManager::unmount`] tears the
//! namespace down at once but the slot stays reserved until the guard
//! goes away, so no new mount can start under an operation still running.

use std::collections::HashMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};
use serde::{Deserialize, Serialize};
use tempfile::TempDir;
use tracing::{debug, warn};

use crate::block::{capture, materialize, BlockStore};
use crate::mount::error::{MountError, MountResult};
use crate::mount::namespace::Namespace;
use crate::types::RepoId;

/// What a mount does when the repository is already mounted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MountWait {
    /// fail immediately with `MountConflict`
    Fail,
    /// block until the other mount is released, up to `millis`
    Wait { millis: u64 },
}

impl Default for MountWait {
    fn default() -> Self {
        MountWait::Wait { millis: 5_000 }
    }
}

/// Mount manager configuration.
#[derive(Debug, Clone)]
pub struct MountConfig {
    /// scratch root; a fresh temporary directory when `None`
    pub root: Option<PathBuf>,
    /// prefix of every namespace directory name
    pub prefix: String,
    pub wait: MountWait,
}

impl Default for MountConfig {
    fn default() -> Self {
        Self {
            root: None,
            prefix: "repo-".to_string(),
            wait: MountWait::default(),
        }
    }
}

/// Keeps at most one live namespace per repository id.
///
/// Thread-safe: clone it to share, it uses Arc internally.
#[derive(Clone)]
pub struct MountManager {
    inner: Arc<MountManagerInner>,
}

struct MountManagerInner {
    root: PathBuf,
    prefix: String,
    wait: MountWait,
    table: Mutex<MountTable>,
    /// signalled whenever a slot is released
    released: Condvar,
    /// removes the scratch root when the last clone goes away
    _scratch: Option<TempDir>,
}

#[derive(Default)]
struct MountTable {
    slots: HashMap<RepoId, Slot>,
    paths: HashMap<PathBuf, RepoId>,
    next_generation: u64,
}

struct Slot {
    generation: u64,
    path: PathBuf,
    live: Arc<AtomicBool>,
}

impl MountManager {
    /// Create a manager, preparing its scratch root.
    pub fn new(config: MountConfig) -> MountResult<Self> {
        if config.prefix.contains(|c| c == '/' || c == '\\') || config.prefix.starts_with('.') {
            return Err(MountError::InvalidPath(PathBuf::from(config.prefix)));
        }

        let (root, scratch) = match config.root {
            Some(root) => {
                fs::create_dir_all(&root).map_err(|e| MountError::io(&root, e))?;
                (root, None)
            }
            None => {
                let dir = tempfile::Builder::new()
                    .prefix("gitblock-")
                    .tempdir()
                    .map_err(|e| MountError::io(std::env::temp_dir(), e))?;
                (dir.path().to_path_buf(), Some(dir))
            }
        };
        debug!(root = %root.display(), "mount manager ready");

        Ok(Self {
            inner: Arc::new(MountManagerInner {
                root,
                prefix: config.prefix,
                wait: config.wait,
                table: Mutex::new(MountTable::default()),
                released: Condvar::new(),
                _scratch: scratch,
            }),
        })
    }

    /// scratch root holding all namespaces
    pub fn root(&self) -> &Path {
        &self.inner.root
    }

    /// Namespace path for a repository.
    ///
    /// Injective because the id's textual form is canonical; the slot
    /// table still checks path ownership on every mount.
    pub fn namespace_path(&self, id: &RepoId) -> PathBuf {
        self.inner.root.join(format!("{}{}", self.inner.prefix, id))
    }

    /// Mount `store` for `id`.
    ///
    /// Any stale directory at the namespace path is removed first, so the
    /// namespace holds exactly the files of `store`. If `id` is already
    /// mounted this blocks or fails according to the wait policy.
    pub fn mount(&self, id: RepoId, store: &BlockStore) -> MountResult<MountGuard> {
        let path = self.namespace_path(&id);
        let namespace = self.reserve(id, path)?;
        let guard = MountGuard {
            manager: self.clone(),
            namespace,
            released: false,
        };

        // on failure the guard drops and releases the slot
        guard.populate(store)?;
        debug!(%id, blocks = store.len(), "mounted");
        Ok(guard)
    }

    /// Unmount whatever is mounted for `id`.
    ///
    /// Returns `false` when nothing was mounted. Outstanding guards and
    /// namespace handles for the old mount become invalid and the namespace
    /// directory is removed. The slot itself is freed only when the guard
    /// is unmounted or dropped; until then mounts of `id` wait or conflict.
    pub fn unmount(&self, id: RepoId) -> MountResult<bool> {
        let path = {
            let table = self.inner.table.lock();
            match table.slots.get(&id) {
                Some(slot) if slot.live.swap(false, Ordering::SeqCst) => {
                    Some(slot.path.clone())
                }
                _ => None,
            }
        };

        match path {
            Some(path) => {
                remove_namespace(&path)?;
                debug!(%id, "namespace revoked");
                Ok(true)
            }
            None => {
                debug!(%id, "unmount requested with nothing mounted");
                Ok(false)
            }
        }
    }

    /// check whether `id` has a live mount
    pub fn is_mounted(&self, id: &RepoId) -> bool {
        self.inner
            .table
            .lock()
            .slots
            .get(id)
            .is_some_and(|slot| slot.live.load(Ordering::SeqCst))
    }

    /// number of live mounts
    pub fn active_mounts(&self) -> usize {
        self.inner
            .table
            .lock()
            .slots
            .values()
            .filter(|slot| slot.live.load(Ordering::SeqCst))
            .count()
    }

    fn reserve(&self, id: RepoId, path: PathBuf) -> MountResult<Namespace> {
        let deadline = match self.inner.wait {
            MountWait::Fail => None,
            MountWait::Wait { millis } => Some(Instant::now() + Duration::from_millis(millis)),
        };

        let mut table = self.inner.table.lock();
        while table.slots.contains_key(&id) {
            let timed_out = match deadline {
                Some(deadline) => self
                    .inner
                    .released
                    .wait_until(&mut table, deadline)
                    .timed_out(),
                None => true,
            };
            if timed_out && table.slots.contains_key(&id) {
                return Err(MountError::Conflict { id });
            }
        }

        if let Some(bound) = table.paths.get(&path) {
            return Err(MountError::PathCollision {
                path,
                bound: *bound,
                requested: id,
            });
        }

        let generation = table.next_generation;
        table.next_generation += 1;
        let live = Arc::new(AtomicBool::new(true));
        table.slots.insert(
            id,
            Slot {
                generation,
                path: path.clone(),
                live: Arc::clone(&live),
            },
        );
        table.paths.insert(path.clone(), id);

        Ok(Namespace::new(id, path, generation, live))
    }

    /// Free the slot owned by a guard. Returns `false` when the mount had
    /// already been revoked by [`unmount`](Self::unmount).
    fn release(&self, id: RepoId, generation: u64) -> MountResult<bool> {
        let (path, was_live) = {
            let table = self.inner.table.lock();
            match table.slots.get(&id) {
                Some(slot) if slot.generation == generation => {
                    (slot.path.clone(), slot.live.swap(false, Ordering::SeqCst))
                }
                _ => return Ok(false),
            }
        };

        // also sweeps files an operation wrote after a revocation; the slot
        // stays reserved until the directory is gone
        let removed = remove_namespace(&path);

        {
            let mut table = self.inner.table.lock();
            table.slots.remove(&id);
            table.paths.remove(&path);
        }
        self.inner.released.notify_all();
        debug!(%id, "unmounted");

        removed.map(|()| was_live)
    }
}

impl std::fmt::Debug for MountManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MountManager")
            .field("root", &self.inner.root)
            .field("active_mounts", &self.active_mounts())
            .finish()
    }
}

fn remove_namespace(path: &Path) -> MountResult<()> {
    match fs::remove_dir_all(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(MountError::io(path, e)),
    }
}

/// Scoped ownership of one mount.
///
/// Dropping the guard unmounts; call [`unmount`](Self::unmount) to observe
/// teardown errors instead of having them logged.
pub struct MountGuard {
    manager: MountManager,
    namespace: Namespace,
    released: bool,
}

impl MountGuard {
    /// handle passed to git operations
    pub fn namespace(&self) -> &Namespace {
        &self.namespace
    }

    pub fn id(&self) -> RepoId {
        self.namespace.id()
    }

    pub fn path(&self) -> &Path {
        self.namespace.path()
    }

    /// Replace the namespace contents with `store`, keeping the binding.
    pub fn remount(&mut self, store: &BlockStore) -> MountResult<()> {
        self.namespace.ensure_mounted()?;
        self.populate(store)?;
        debug!(id = %self.id(), blocks = store.len(), "remounted");
        Ok(())
    }

    /// Capture the live namespace into a block store.
    pub fn snapshot(&self) -> MountResult<BlockStore> {
        self.namespace.ensure_mounted()?;
        Ok(capture(self.namespace.path())?)
    }

    /// Unmount, reporting teardown errors.
    ///
    /// Returns `false` if the namespace was already revoked by
    /// `MountManager::unmount`; the slot is freed either way.
    pub fn unmount(mut self) -> MountResult<bool> {
        self.released = true;
        self.manager
            .release(self.namespace.id(), self.namespace.generation())
    }

    fn populate(&self, store: &BlockStore) -> MountResult<()> {
        let path = self.namespace.path();
        match fs::remove_dir_all(path) {
            Ok(()) => debug!(path = %path.display(), "replaced existing namespace"),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => return Err(MountError::io(path, e)),
        }
        fs::create_dir_all(path).map_err(|e| MountError::io(path, e))?;
        materialize(store, path)?;
        Ok(())
    }
}

impl Drop for MountGuard {
    fn drop(&mut self) {
        if self.released {
            return;
        }
        if let Err(e) = self
            .manager
            .release(self.namespace.id(), self.namespace.generation())
        {
            warn!(id = %self.namespace.id(), error = %e, "unmount on drop failed");
        }
    }
}

impl std::fmt::Debug for MountGuard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MountGuard")
            .field("namespace", &self.namespace)
            .finish()
    }
}
