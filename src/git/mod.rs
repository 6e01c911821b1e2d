//! Git porcelain over mounted namespaces.
//!
//! ```text
//!   Repository ──▶ dyn GitOperations ──▶ Git2Engine ──▶ libgit2
//!                        │
//!                        └── every call takes a &Namespace
//! ```
//!
//! The facade never mounts anything itself; callers hold a
//! [`MountGuard`](crate::mount::MountGuard) for the duration of a sequence
//! and pass its namespace to each step.

mod engine;
mod error;
mod ops;
mod types;

pub use engine::Git2Engine;
pub use error::{GitError, GitResult};
pub use ops::GitOperations;
pub use types::{Author, BranchRef, CommitId, CommitInfo, DirEntry, EntryKind, GitStep};

/// name of the git metadata directory at the namespace root
pub const GIT_DIR: &str = ".git";
