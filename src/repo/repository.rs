//! The repository entity.
//!
//! A repository owns the serialized payload of one block store. Every
//! operation follows the same shape:
//!
//! ```text
//! payload ─decode─▶ store ─mount─▶ namespace ─git─▶ result
//!                                     │
//!                                     └─ unmount (always)
//! ```
//!
//! Creation additionally snapshots and re-encodes the namespace before it
//! is unmounted; `data` changes only once both steps succeeded.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::block::{self, BlockStore};
use crate::codec::{self, Payload};
use crate::git::{EntryKind, GitOperations, GIT_DIR};
use crate::mount::{MountGuard, Namespace};
use crate::repo::error::RepoResult;
use crate::repo::projection::CommitSummary;
use crate::repo::types::{
    CodebaseMetadata, CreateRepo, FileMetadata, FileType, RepoInfo, RepoName, RepoOwner, RepoSlug,
};
use crate::repo::workspace::Workspace;
use crate::types::RepoId;

/// A user repository stored as an encoded block store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Repository {
    id: RepoId,
    owner: RepoOwner,
    name: RepoName,
    description: String,
    link: String,
    star_count: u64,
    fork_count: u64,
    /// last persisted state; empty until creation finished
    data: Payload,
    created_at: DateTime<Utc>,
}

impl Repository {
    /// An uninitialized repository with an empty payload.
    pub fn new(slug: RepoSlug, request: &CreateRepo) -> Self {
        Self {
            id: RepoId::generate(),
            owner: slug.owner,
            name: slug.name,
            description: request.description.clone(),
            link: request.link.clone(),
            star_count: 0,
            fork_count: 0,
            data: Payload::default(),
            created_at: Utc::now(),
        }
    }

    pub fn id(&self) -> RepoId {
        self.id
    }

    pub fn owner(&self) -> &RepoOwner {
        &self.owner
    }

    pub fn name(&self) -> &RepoName {
        &self.name
    }

    pub fn slug(&self) -> RepoSlug {
        RepoSlug {
            owner: self.owner.clone(),
            name: self.name.clone(),
        }
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// check if creation has produced a payload yet
    pub fn is_initialized(&self) -> bool {
        !self.data.is_empty()
    }

    /// read-only projection of the descriptive fields
    pub fn info(&self) -> RepoInfo {
        RepoInfo {
            id: self.id,
            name: self.name.clone(),
            owner: self.owner.clone(),
            description: self.description.clone(),
            link: self.link.clone(),
            star_count: self.star_count,
            fork_count: self.fork_count,
        }
    }

    /// raw payload passthrough
    pub fn data(&self) -> &Payload {
        &self.data
    }

    /// Replace the payload.
    ///
    /// The payload must decode with a known codec and describe a tree that
    /// stays inside its namespace; it is stored as given, without
    /// re-encoding.
    pub fn set_data(&mut self, payload: Payload) -> RepoResult<()> {
        let store = codec::decode(&payload)?;
        block::validate(&store)?;
        debug!(
            id = %self.id,
            blocks = store.len(),
            block_bytes = store.byte_size(),
            bytes = payload.len(),
            "payload replaced"
        );
        self.data = payload;
        Ok(())
    }

    /// Run the creation sequence.
    ///
    /// Mounts an empty store, initializes git, creates the default branch,
    /// commits the seed file, then snapshots and encodes the namespace.
    /// On any failure the mount is released and `data` keeps its prior
    /// value.
    pub fn initialize(&mut self, ws: &Workspace) -> RepoResult<()> {
        let mount = ws.mounts().mount(self.id, &BlockStore::new())?;
        debug!(id = %self.id, path = %mount.path().display(), "mounted for creation");

        let outcome = self.seed(ws, mount.namespace()).and_then(|()| {
            let store = mount.snapshot()?;
            Ok(ws.codec().serialize(&store)?)
        });
        let payload = finish(mount, outcome)?;

        info!(
            id = %self.id,
            repo = %self.slug(),
            bytes = payload.len(),
            codec = ws.codec().name(),
            "repository created"
        );
        self.data = payload;
        Ok(())
    }

    fn seed(&self, ws: &Workspace, ns: &Namespace) -> RepoResult<()> {
        let config = ws.config();
        let git = ws.git();

        git.init_repository(ns)?;
        git.create_branch(ns, &config.default_branch, true)?;
        debug!(id = %self.id, branch = %config.default_branch, "initialized");

        let contents = config.render_seed(&self.slug());
        ns.write_file(&config.seed_file, contents.as_bytes())?;
        git.stage_file(ns, &config.seed_file)?;
        let commit = git.commit(ns, &config.commit_message, &config.author)?;
        debug!(id = %self.id, commit = %commit, "seed committed");
        Ok(())
    }

    /// Mount the current payload, run `f`, unmount.
    fn with_mount<T>(
        &self,
        ws: &Workspace,
        f: impl FnOnce(&dyn GitOperations, &Namespace) -> RepoResult<T>,
    ) -> RepoResult<T> {
        let store = if self.data.is_empty() {
            BlockStore::new()
        } else {
            codec::decode(&self.data)?
        };
        let mount = ws.mounts().mount(self.id, &store)?;
        let outcome = f(ws.git(), mount.namespace());
        finish(mount, outcome)
    }

    /// Listing of the checked-out tree with commit data from the
    /// workspace's projection.
    ///
    /// Recomputed on every call; the git metadata directory is omitted.
    pub fn latest_codebase_metadata(&self, ws: &Workspace) -> RepoResult<CodebaseMetadata> {
        self.with_mount(ws, |git, ns| {
            let summary = ws.projection().project(git, ns)?;
            let files = project_dir(git, ns, Path::new(""), &summary)?;
            Ok(CodebaseMetadata {
                latest_commit: summary.latest,
                total_commits: summary.total_commits,
                files,
            })
        })
    }

    /// One `<oid>\trefs/heads/<name>` line per local branch, sorted by name.
    pub fn advertise_refs(&self, ws: &Workspace) -> RepoResult<String> {
        self.with_mount(ws, |git, ns| {
            let refs: String = git
                .list_branches(ns)?
                .iter()
                .map(|branch| format!("{}\t{}\n", branch.target, branch.ref_path()))
                .collect();
            Ok(refs)
        })
    }

    /// Files tracked at `reference`.
    ///
    /// Falls back to walking the working tree when the engine cannot read
    /// trees.
    pub fn list_files(&self, ws: &Workspace, reference: &str) -> RepoResult<Vec<String>> {
        self.with_mount(ws, |git, ns| match git.list_tracked_files(ns, reference) {
            Ok(files) => Ok(files),
            Err(e) if e.is_unsupported() => {
                debug!(id = %self.id, "tracked files unsupported, walking working tree");
                let mut files = Vec::new();
                walk_files(git, ns, PathBuf::new(), &mut files)?;
                files.sort();
                Ok(files)
            }
            Err(e) => Err(e.into()),
        })
    }
}

/// Unmount, reporting the operation's error ahead of a teardown error.
fn finish<T>(mount: MountGuard, outcome: RepoResult<T>) -> RepoResult<T> {
    let released = mount.unmount();
    let value = outcome?;
    released?;
    Ok(value)
}

fn project_dir(
    git: &dyn GitOperations,
    ns: &Namespace,
    dir: &Path,
    summary: &CommitSummary,
) -> RepoResult<BTreeMap<String, FileMetadata>> {
    let mut files = BTreeMap::new();
    for entry in git.list_directory_at(ns, dir)? {
        if dir.as_os_str().is_empty() && entry.name == GIT_DIR {
            continue;
        }
        let (file_type, children) = if entry.is_dir() {
            let children = project_dir(git, ns, &dir.join(&entry.name), summary)?;
            (FileType::Dir, Some(children))
        } else {
            (FileType::File, None)
        };
        files.insert(
            entry.name,
            FileMetadata {
                file_type,
                latest_commit_message: summary.latest.message.clone(),
                latest_commit_date: summary.latest.date,
                children,
            },
        );
    }
    Ok(files)
}

fn walk_files(
    git: &dyn GitOperations,
    ns: &Namespace,
    dir: PathBuf,
    files: &mut Vec<String>,
) -> RepoResult<()> {
    for entry in git.list_directory_at(ns, &dir)? {
        if dir.as_os_str().is_empty() && entry.name == GIT_DIR {
            continue;
        }
        let path = dir.join(&entry.name);
        match entry.kind {
            EntryKind::Dir => walk_files(git, ns, path, files)?,
            EntryKind::File | EntryKind::Symlink => {
                files.push(path.to_string_lossy().replace('\\', "/"));
            }
        }
    }
    Ok(())
}
