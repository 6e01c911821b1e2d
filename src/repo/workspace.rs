//! Everything a repository needs to run its operations.

use std::sync::Arc;

use crate::codec::BlobCodec;
use crate::config::GitblockConfig;
use crate::git::{Git2Engine, GitOperations};
use crate::mount::MountManager;
use crate::repo::error::RepoResult;
use crate::repo::projection::{CommitProjection, PlaceholderProjection};

/// Shared services for repository operations: the mount manager, the git
/// engine, the commit projection and the creation settings.
///
/// Thread-safe: clone it to share, it uses Arc internally.
#[derive(Clone)]
pub struct Workspace {
    inner: Arc<WorkspaceInner>,
}

struct WorkspaceInner {
    config: GitblockConfig,
    mounts: MountManager,
    git: Arc<dyn GitOperations>,
    projection: Arc<dyn CommitProjection>,
}

impl Workspace {
    /// Build a workspace with the `git2` engine and placeholder commit data.
    pub fn new(config: GitblockConfig) -> RepoResult<Self> {
        Self::with_parts(config, Arc::new(Git2Engine::new()), Arc::new(PlaceholderProjection))
    }

    /// Build a workspace with a custom engine and projection.
    pub fn with_parts(
        config: GitblockConfig,
        git: Arc<dyn GitOperations>,
        projection: Arc<dyn CommitProjection>,
    ) -> RepoResult<Self> {
        config.validate()?;
        let mounts = MountManager::new(config.mount_config())?;
        Ok(Self {
            inner: Arc::new(WorkspaceInner {
                config,
                mounts,
                git,
                projection,
            }),
        })
    }

    pub fn config(&self) -> &GitblockConfig {
        &self.inner.config
    }

    pub fn mounts(&self) -> &MountManager {
        &self.inner.mounts
    }

    pub fn git(&self) -> &dyn GitOperations {
        self.inner.git.as_ref()
    }

    pub fn projection(&self) -> &dyn CommitProjection {
        self.inner.projection.as_ref()
    }

    /// codec used when writing payloads
    pub fn codec(&self) -> &'static dyn BlobCodec {
        self.inner.config.codec.codec()
    }
}

impl std::fmt::Debug for Workspace {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Workspace")
            .field("mounts", &self.inner.mounts)
            .field("codec", &self.codec().name())
            .finish_non_exhaustive()
    }
}
