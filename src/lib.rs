//! gitblock - git repositories held as serialized block stores
//!
//! Each repository's working tree and object database live in a
//! [`BlockStore`](block::BlockStore), encoded into an opaque
//! [`Payload`](codec::Payload) for long-term storage. An operation mounts
//! the store into a scratch namespace directory, runs git porcelain
//! against it, and unmounts again.
//!
//! # Example
//!
//! ```no_run
//! use gitblock::config::GitblockConfig;
//! use gitblock::repo::{CreateRepo, RepoIndex, Workspace};
//!
//! let workspace = Workspace::new(GitblockConfig::default()).unwrap();
//! let index = RepoIndex::new(workspace);
//!
//! let id = index.create_repo(CreateRepo::new("alice", "demo")).unwrap();
//! let metadata = index.codebase_metadata(&id).unwrap();
//! assert_eq!(metadata.total_commits, 1);
//! ```

pub mod block;
pub mod codec;
pub mod config;
pub mod git;
pub mod mount;
pub mod repo;
pub mod store;
pub mod types;
