//! Object store error types.

use std::path::PathBuf;

use thiserror::Error;

/// errors raised by an object store
#[derive(Debug, Error)]
pub enum StoreError {
    /// key is empty or contains a segment that cannot be used as a file name
    #[error("invalid object key '{0}'")]
    InvalidKey(String),

    /// I/O error from a directory backed store
    #[error("io error at {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl StoreError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

/// result type alias for object store operations
pub type StoreResult<T> = Result<T, StoreError>;
