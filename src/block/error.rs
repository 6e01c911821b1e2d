//! Block layout error types.

use std::path::PathBuf;

use thiserror::Error;

use crate::block::store::BlockKey;

/// errors raised while turning a block store into files or back
#[derive(Debug, Error)]
pub enum LayoutError {
    /// a block referenced by an inode or directory is absent
    #[error("missing block {0}")]
    MissingBlock(BlockKey),

    /// an inode block could not be decoded
    #[error("malformed inode in block {key}: {source}")]
    MalformedInode {
        key: BlockKey,
        #[source]
        source: serde_json::Error,
    },

    /// a directory block could not be decoded
    #[error("malformed directory listing in block {key}: {source}")]
    MalformedDirectory {
        key: BlockKey,
        #[source]
        source: serde_json::Error,
    },

    /// the root inode is not a directory
    #[error("root inode in block {0} is not a directory")]
    RootNotDirectory(BlockKey),

    /// a directory entry name would escape its directory
    #[error("invalid entry name {name:?} in directory block {dir}")]
    InvalidEntryName { dir: BlockKey, name: String },

    /// a block is reachable twice (shared data or a cycle)
    #[error("block {0} is referenced more than once")]
    SharedBlock(BlockKey),

    /// a symlink target is absolute or climbs above the root
    #[error("symlink {} points outside the tree: {}", path.display(), target.display())]
    EscapingSymlink { path: PathBuf, target: PathBuf },

    /// the top-level `.git` entry is a file or symlink
    #[error("top-level .git entry in block {0} is not a directory")]
    GitDirNotDirectory(BlockKey),

    /// file kind we cannot represent (sockets, devices, ...)
    #[error("unsupported file type at {0}")]
    UnsupportedFileType(PathBuf),

    /// file name is not valid UTF-8
    #[error("file name is not valid utf-8: {0}")]
    NonUtf8Name(PathBuf),

    /// encoding an inode or listing failed
    #[error("failed to encode block: {0}")]
    Encode(#[from] serde_json::Error),

    /// I/O error on the namespace
    #[error("io error at {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl LayoutError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// check if the error comes from malformed store content rather than I/O
    pub fn is_corruption(&self) -> bool {
        matches!(
            self,
            LayoutError::MissingBlock(_)
                | LayoutError::MalformedInode { .. }
                | LayoutError::MalformedDirectory { .. }
                | LayoutError::RootNotDirectory(_)
                | LayoutError::InvalidEntryName { .. }
                | LayoutError::SharedBlock(_)
                | LayoutError::EscapingSymlink { .. }
                | LayoutError::GitDirNotDirectory(_)
        )
    }
}

/// result type alias for layout operations
pub type LayoutResult<T> = Result<T, LayoutError>;
