//! `git2`-backed implementation of the porcelain contract.

use std::fs;
use std::path::{Path, PathBuf};

use git2::build::CheckoutBuilder;
use git2::{Branch, BranchType, ErrorCode, ObjectType, Repository, TreeWalkMode, TreeWalkResult};
use tracing::debug;

use crate::git::error::{GitError, GitResult};
use crate::git::ops::GitOperations;
use crate::git::types::{Author, BranchRef, CommitId, CommitInfo, DirEntry, EntryKind, GitStep};
use crate::mount::Namespace;

/// Runs porcelain operations through libgit2 against the namespace
/// directory.
#[derive(Debug, Clone, Copy, Default)]
pub struct Git2Engine;

impl Git2Engine {
    pub fn new() -> Self {
        Self
    }
}

/// one facade call: the step plus the namespace it runs against
struct Op<'a> {
    step: GitStep,
    ns: &'a Namespace,
}

impl<'a> Op<'a> {
    /// start a step, refusing to run against an unmounted namespace
    fn start(step: GitStep, ns: &'a Namespace) -> GitResult<Self> {
        if !ns.is_mounted() {
            return Err(GitError::NotMounted {
                step,
                path: ns.path().to_path_buf(),
            });
        }
        debug!(id = %ns.id(), %step, "git");
        Ok(Self { step, ns })
    }

    fn fail(&self, source: git2::Error) -> GitError {
        GitError::Engine {
            step: self.step,
            path: self.ns.path().to_path_buf(),
            source,
        }
    }

    fn invalid(&self, reason: impl Into<String>) -> GitError {
        GitError::InvalidArgument {
            step: self.step,
            path: self.ns.path().to_path_buf(),
            reason: reason.into(),
        }
    }

    fn io(&self, path: &Path, source: std::io::Error) -> GitError {
        GitError::Io {
            step: self.step,
            path: path.to_path_buf(),
            source,
        }
    }

    fn open(&self) -> GitResult<Repository> {
        Repository::open(self.ns.path()).map_err(|e| self.fail(e))
    }

    /// HEAD commit, `None` while HEAD is unborn
    fn head<'r>(&self, repo: &'r Repository) -> GitResult<Option<git2::Commit<'r>>> {
        match repo.head() {
            Ok(head) => head.peel_to_commit().map(Some).map_err(|e| self.fail(e)),
            Err(e) if matches!(e.code(), ErrorCode::UnbornBranch | ErrorCode::NotFound) => Ok(None),
            Err(e) => Err(self.fail(e)),
        }
    }

    /// resolve a namespace-relative path; the empty path is the root
    fn resolve(&self, relative: &Path) -> GitResult<PathBuf> {
        if relative.as_os_str().is_empty() {
            return Ok(self.ns.path().to_path_buf());
        }
        self.ns
            .resolve(relative)
            .map_err(|_| self.invalid(format!("path {:?} escapes the namespace", relative)))
    }
}

impl GitOperations for Git2Engine {
    fn init_repository(&self, ns: &Namespace) -> GitResult<()> {
        let op = Op::start(GitStep::Init, ns)?;
        Repository::init(ns.path()).map_err(|e| op.fail(e))?;
        Ok(())
    }

    fn create_branch(&self, ns: &Namespace, name: &str, checkout: bool) -> GitResult<()> {
        let op = Op::start(GitStep::CreateBranch, ns)?;
        if !Branch::name_is_valid(name).map_err(|e| op.fail(e))? {
            return Err(op.invalid(format!("invalid branch name '{}'", name)));
        }

        let repo = op.open()?;
        let ref_path = format!("refs/heads/{}", name);

        match op.head(&repo)? {
            Some(commit) => {
                repo.branch(name, &commit, false).map_err(|e| op.fail(e))?;
                if checkout {
                    repo.set_head(&ref_path).map_err(|e| op.fail(e))?;
                    repo.checkout_head(Some(CheckoutBuilder::new().safe()))
                        .map_err(|e| op.fail(e))?;
                }
            }
            // unborn: the branch comes into existence with the first commit
            None if checkout => repo.set_head(&ref_path).map_err(|e| op.fail(e))?,
            None => {
                return Err(op.invalid(format!(
                    "cannot create branch '{}' without a commit unless it is checked out",
                    name
                )))
            }
        }
        Ok(())
    }

    fn stage_file(&self, ns: &Namespace, filepath: &str) -> GitResult<()> {
        let op = Op::start(GitStep::StageFile, ns)?;
        let relative = Path::new(filepath);
        ns.resolve(relative)
            .map_err(|_| op.invalid(format!("'{}' is not a path inside the namespace", filepath)))?;

        let repo = op.open()?;
        let mut index = repo.index().map_err(|e| op.fail(e))?;
        index.add_path(relative).map_err(|e| op.fail(e))?;
        index.write().map_err(|e| op.fail(e))?;
        Ok(())
    }

    fn commit(&self, ns: &Namespace, message: &str, author: &Author) -> GitResult<CommitId> {
        let op = Op::start(GitStep::Commit, ns)?;
        let repo = op.open()?;

        let signature = author.to_git2_signature().map_err(|e| op.fail(e))?;
        let tree_id = repo
            .index()
            .and_then(|mut index| index.write_tree())
            .map_err(|e| op.fail(e))?;
        let tree = repo.find_tree(tree_id).map_err(|e| op.fail(e))?;

        let parent = op.head(&repo)?;
        let parents: Vec<&git2::Commit<'_>> = parent.iter().collect();

        let oid = repo
            .commit(Some("HEAD"), &signature, &signature, message, &tree, &parents)
            .map_err(|e| op.fail(e))?;
        Ok(CommitId::new(oid))
    }

    fn list_tracked_files(&self, ns: &Namespace, reference: &str) -> GitResult<Vec<String>> {
        let op = Op::start(GitStep::ListTrackedFiles, ns)?;
        let repo = op.open()?;

        let tree = repo
            .revparse_single(reference)
            .and_then(|object| object.peel_to_tree())
            .map_err(|e| op.fail(e))?;

        let mut files = Vec::new();
        tree.walk(TreeWalkMode::PreOrder, |root, entry| {
            if entry.kind() == Some(ObjectType::Blob) {
                let name = String::from_utf8_lossy(entry.name_bytes());
                files.push(format!("{}{}", root, name));
            }
            TreeWalkResult::Ok
        })
        .map_err(|e| op.fail(e))?;

        files.sort();
        Ok(files)
    }

    fn list_directory_at(&self, ns: &Namespace, relative: &Path) -> GitResult<Vec<DirEntry>> {
        let op = Op::start(GitStep::ListDirectory, ns)?;
        let dir = op.resolve(relative)?;

        let mut entries = Vec::new();
        for entry in fs::read_dir(&dir).map_err(|e| op.io(&dir, e))? {
            let entry = entry.map_err(|e| op.io(&dir, e))?;
            let path = entry.path();
            let name = entry
                .file_name()
                .into_string()
                .map_err(|_| op.invalid(format!("non utf-8 file name at {}", path.display())))?;
            let file_type = entry.file_type().map_err(|e| op.io(&path, e))?;

            let kind = if file_type.is_dir() {
                EntryKind::Dir
            } else if file_type.is_symlink() {
                EntryKind::Symlink
            } else {
                EntryKind::File
            };
            entries.push(DirEntry { name, kind });
        }

        entries.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(entries)
    }

    fn list_branches(&self, ns: &Namespace) -> GitResult<Vec<BranchRef>> {
        let op = Op::start(GitStep::ListBranches, ns)?;
        let repo = op.open()?;

        let mut branches = Vec::new();
        for item in repo.branches(Some(BranchType::Local)).map_err(|e| op.fail(e))? {
            let (branch, _) = item.map_err(|e| op.fail(e))?;
            let name = branch.name().map_err(|e| op.fail(e))?;
            if let (Some(name), Some(target)) = (name, branch.get().target()) {
                branches.push(BranchRef {
                    name: name.to_string(),
                    target: CommitId::new(target),
                });
            }
        }

        branches.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(branches)
    }

    fn head_commit(&self, ns: &Namespace) -> GitResult<Option<CommitInfo>> {
        let op = Op::start(GitStep::HeadCommit, ns)?;
        let repo = op.open()?;
        let head = op.head(&repo)?;
        Ok(head.as_ref().map(CommitInfo::from_git2))
    }

    fn count_commits(&self, ns: &Namespace) -> GitResult<usize> {
        let op = Op::start(GitStep::CountCommits, ns)?;
        let repo = op.open()?;
        if op.head(&repo)?.is_none() {
            return Ok(0);
        }

        let mut walk = repo.revwalk().map_err(|e| op.fail(e))?;
        walk.push_head().map_err(|e| op.fail(e))?;
        let mut count = 0;
        for oid in walk {
            oid.map_err(|e| op.fail(e))?;
            count += 1;
        }
        Ok(count)
    }
}
