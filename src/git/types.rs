//! type-safe wrappers around git primitives used by the facade.

use std::fmt;

use chrono::{DateTime, TimeZone, Utc};
use git2::Oid;
use serde::{Deserialize, Serialize};

/// Git commit identifier.
///
/// The inner Oid is only reachable inside the crate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CommitId(pub(crate) Oid);

impl CommitId {
    pub(crate) fn new(oid: Oid) -> Self {
        Self(oid)
    }

    /// parse a CommitId from a hex string
    pub fn from_hex(hex: &str) -> Result<Self, git2::Error> {
        Oid::from_str(hex).map(CommitId)
    }

    /// short form of the commit ID
    pub fn short(&self) -> String {
        self.0.to_string()[..7].to_string()
    }
}

impl fmt::Display for CommitId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// commit author (also used as committer)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Author {
    pub name: String,
    pub email: String,
}

impl Author {
    pub fn new(name: impl Into<String>, email: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            email: email.into(),
        }
    }

    /// identity used for the seed commit of new repositories
    pub fn gitblock() -> Self {
        Self::new("gitblock", "gitblock@localhost")
    }

    pub(crate) fn to_git2_signature(&self) -> Result<git2::Signature<'static>, git2::Error> {
        git2::Signature::now(&self.name, &self.email)
    }
}

impl Default for Author {
    fn default() -> Self {
        Self::gitblock()
    }
}

/// information about a commit
#[derive(Debug, Clone)]
pub struct CommitInfo {
    pub id: CommitId,
    pub message: String,
    pub author: Author,
    pub timestamp: DateTime<Utc>,
}

impl CommitInfo {
    pub(crate) fn from_git2(commit: &git2::Commit<'_>) -> Self {
        let author = commit.author();
        let timestamp = Utc
            .timestamp_opt(commit.time().seconds(), 0)
            .single()
            .unwrap_or_else(Utc::now);

        Self {
            id: CommitId::new(commit.id()),
            message: commit.message().unwrap_or("").to_string(),
            author: Author::new(
                author.name().unwrap_or("Unknown"),
                author.email().unwrap_or("unknown@unknown"),
            ),
            timestamp,
        }
    }

    /// first line of the message
    pub fn summary(&self) -> &str {
        self.message.lines().next().unwrap_or(&self.message)
    }
}

/// a local branch and the commit it points to
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BranchRef {
    pub name: String,
    pub target: CommitId,
}

impl BranchRef {
    /// full ref path, e.g. `refs/heads/main`
    pub fn ref_path(&self) -> String {
        format!("refs/heads/{}", self.name)
    }
}

/// kind of a raw directory entry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryKind {
    File,
    Dir,
    Symlink,
}

/// one entry of a raw namespace listing
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirEntry {
    pub name: String,
    pub kind: EntryKind,
}

impl DirEntry {
    pub fn is_dir(&self) -> bool {
        self.kind == EntryKind::Dir
    }
}

/// Which facade operation was running, for error context.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GitStep {
    Init,
    CreateBranch,
    StageFile,
    Commit,
    ListTrackedFiles,
    ListDirectory,
    ListBranches,
    HeadCommit,
    CountCommits,
}

impl fmt::Display for GitStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            GitStep::Init => "init",
            GitStep::CreateBranch => "branch",
            GitStep::StageFile => "add",
            GitStep::Commit => "commit",
            GitStep::ListTrackedFiles => "ls-files",
            GitStep::ListDirectory => "list-directory",
            GitStep::ListBranches => "list-branches",
            GitStep::HeadCommit => "head",
            GitStep::CountCommits => "rev-list",
        };
        f.write_str(name)
    }
}
