//! Repository and registry error types.

use std::path::PathBuf;

use thiserror::Error;

use crate::block::LayoutError;
use crate::codec::CodecError;
use crate::config::ConfigError;
use crate::git::GitError;
use crate::mount::MountError;
use crate::repo::types::{InvalidNameError, RepoSlug};
use crate::store::StoreError;

/// the main error type for repository operations
#[derive(Debug, Error)]
pub enum RepoError {
    /// no repository matches the given id or slug
    #[error("repository not found: {0}")]
    NotFound(String),

    /// the `(owner, name)` pair is registered or being created
    #[error("repository already exists: {0}")]
    AlreadyExists(RepoSlug),

    /// invalid owner or repository name
    #[error("invalid repository name: {0}")]
    InvalidName(#[from] InvalidNameError),

    /// payload could not be encoded or decoded
    #[error("serialization error: {0}")]
    Serialization(#[from] CodecError),

    /// the repository is mounted by another operation
    #[error("mount conflict: {0}")]
    MountConflict(#[source] MountError),

    /// any other mount failure
    #[error("mount error: {0}")]
    Mount(#[source] MountError),

    /// a git step failed; the source names the step
    #[error("git operation failed: {0}")]
    GitOperationFailure(#[from] GitError),

    /// the stored blocks do not describe a valid file tree
    #[error("layout error: {0}")]
    Layout(#[from] LayoutError),

    /// I/O error outside the mount layer
    #[error("io error at {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// durable store failure
    #[error("store error: {0}")]
    Store(#[from] StoreError),

    /// the workspace configuration is unusable
    #[error("config error: {0}")]
    Config(#[from] ConfigError),

    /// a persisted record could not be read or written
    #[error("bad record '{key}': {source}")]
    Record {
        key: String,
        #[source]
        source: serde_json::Error,
    },
}

impl From<MountError> for RepoError {
    fn from(err: MountError) -> Self {
        match err {
            MountError::Layout(layout) => RepoError::Layout(layout),
            err if err.is_conflict() => RepoError::MountConflict(err),
            err => RepoError::Mount(err),
        }
    }
}

impl RepoError {
    /// check if this is a "not found" error
    pub fn is_not_found(&self) -> bool {
        matches!(self, RepoError::NotFound(_))
    }

    /// check if this error comes from a uniqueness or mount conflict
    pub fn is_conflict(&self) -> bool {
        matches!(self, RepoError::AlreadyExists(_) | RepoError::MountConflict(_))
    }
}

/// result type alias for repository operations
pub type RepoResult<T> = Result<T, RepoError>;
