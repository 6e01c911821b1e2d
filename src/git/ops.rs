//! The porcelain contract consumed by repositories.

use std::path::Path;

use crate::git::error::GitResult;
use crate::git::types::{Author, BranchRef, CommitId, CommitInfo, DirEntry};
use crate::mount::Namespace;

/// Porcelain git operations scoped to a mounted namespace.
///
/// Every method takes the [`Namespace`] borrowed from a live mount guard and
/// must fail with `NotMounted` if the binding has gone away.
pub trait GitOperations: Send + Sync {
    /// create the git metadata structure at the namespace root
    fn init_repository(&self, ns: &Namespace) -> GitResult<()>;

    /// Create a branch at HEAD, optionally checking it out.
    ///
    /// On a repository without commits only `checkout = true` is meaningful:
    /// HEAD is pointed at the unborn branch, which the first commit creates.
    fn create_branch(&self, ns: &Namespace, name: &str, checkout: bool) -> GitResult<()>;

    /// add a file (path relative to the namespace root) to the index
    fn stage_file(&self, ns: &Namespace, filepath: &str) -> GitResult<()>;

    /// commit the index on top of HEAD
    fn commit(&self, ns: &Namespace, message: &str, author: &Author) -> GitResult<CommitId>;

    /// Files recorded in the tree of `reference`.
    ///
    /// Engines that cannot read trees return `Unsupported`; callers then
    /// fall back to [`list_directory`](Self::list_directory).
    fn list_tracked_files(&self, ns: &Namespace, reference: &str) -> GitResult<Vec<String>>;

    /// raw listing of a directory below the namespace root, sorted by name
    fn list_directory_at(&self, ns: &Namespace, relative: &Path) -> GitResult<Vec<DirEntry>>;

    /// Raw listing of the namespace root.
    ///
    /// Includes the `.git` entry; callers exclude it before presenting.
    fn list_directory(&self, ns: &Namespace) -> GitResult<Vec<DirEntry>> {
        self.list_directory_at(ns, Path::new(""))
    }

    /// local branches sorted by name
    fn list_branches(&self, ns: &Namespace) -> GitResult<Vec<BranchRef>>;

    /// the commit HEAD points to, `None` before the first commit
    fn head_commit(&self, ns: &Namespace) -> GitResult<Option<CommitInfo>>;

    /// number of commits reachable from HEAD
    fn count_commits(&self, ns: &Namespace) -> GitResult<usize>;
}
