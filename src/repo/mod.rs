//! Repositories and the registry that owns them.
//!
//! ```text
//!   RepoIndex ──create_repo──▶ Repository::initialize
//!       │                           │
//!       │                           ├─ MountManager::mount(empty store)
//!       │                           ├─ git init / branch / add / commit
//!       │                           ├─ snapshot + BlobCodec::serialize
//!       │                           └─ unmount, then data = payload
//!       │
//!       └──get / metadata──▶ Repository (mount, read, unmount)
//! ```
//!
//! A [`Workspace`] carries the shared services (mount manager, git engine,
//! commit projection, creation settings) into every operation.

mod error;
mod index;
mod projection;
mod repository;
mod types;
mod workspace;

pub use error::{RepoError, RepoResult};
pub use index::{record_key, RepoIndex, INDEX_KEY};
pub use projection::{
    CommitProjection, CommitSummary, HeadCommitProjection, PlaceholderProjection,
    PLACEHOLDER_MESSAGE, PLACEHOLDER_SHORT_HASH,
};
pub use repository::Repository;
pub use types::{
    CodebaseMetadata, CreateRepo, FileMetadata, FileType, InvalidNameError, LatestCommit,
    RepoInfo, RepoName, RepoOwner, RepoSlug,
};
pub use workspace::Workspace;
