//! Mount error types.

use std::path::PathBuf;

use thiserror::Error;

use crate::block::LayoutError;
use crate::types::RepoId;

/// errors raised by the mount manager
#[derive(Debug, Error)]
pub enum MountError {
    /// another mount of the same repository is in flight
    #[error("repository {id} is already mounted")]
    Conflict { id: RepoId },

    /// the namespace path is bound to a different repository
    #[error(
        "namespace {} is bound to repository {bound}, refusing to mount {requested}",
        path.display()
    )]
    PathCollision {
        path: PathBuf,
        bound: RepoId,
        requested: RepoId,
    },

    /// the namespace was unmounted while a handle to it was still in use
    #[error("namespace for repository {0} is no longer mounted")]
    NotMounted(RepoId),

    /// a path given relative to the namespace would escape it
    #[error("path {0:?} is not a plain relative path inside the namespace")]
    InvalidPath(PathBuf),

    /// the store could not be written into or read from the namespace
    #[error("layout error: {0}")]
    Layout(#[from] LayoutError),

    /// I/O error while preparing or removing a namespace
    #[error("io error at {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl MountError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// check if this error reports an overlapping mount
    pub fn is_conflict(&self) -> bool {
        matches!(self, MountError::Conflict { .. } | MountError::PathCollision { .. })
    }
}

/// result type alias for mount operations
pub type MountResult<T> = Result<T, MountError>;
