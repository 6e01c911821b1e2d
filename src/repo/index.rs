//! Registry of repositories.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use parking_lot::Mutex;
use serde::de::Error as _;
use tracing::{debug, info, warn};

use crate::codec::Payload;
use crate::repo::error::{RepoError, RepoResult};
use crate::repo::repository::Repository;
use crate::repo::types::{CodebaseMetadata, CreateRepo, RepoInfo, RepoSlug};
use crate::repo::workspace::Workspace;
use crate::store::ObjectStore;
use crate::types::RepoId;

/// object store key holding the list of repository ids
pub const INDEX_KEY: &str = "repo-index";

/// object store key of one repository record
pub fn record_key(id: &RepoId) -> String {
    format!("repo/{}", id)
}

/// Registry of repositories keyed by id, unique by `(owner, name)`.
///
/// Thread-safe: clone it to share, it uses Arc internally. Creations of
/// different repositories run concurrently; a creation of a pair that is
/// registered or already in flight fails with `AlreadyExists`.
#[derive(Clone)]
pub struct RepoIndex {
    inner: Arc<RepoIndexInner>,
}

struct RepoIndexInner {
    workspace: Workspace,
    state: Mutex<IndexState>,
}

#[derive(Default)]
struct IndexState {
    repos: HashMap<RepoId, Repository>,
    by_slug: HashMap<RepoSlug, RepoId>,
    /// pairs whose creation is in flight
    pending: HashSet<RepoSlug>,
}

impl IndexState {
    fn insert(&mut self, repo: Repository) -> RepoResult<()> {
        let slug = repo.slug();
        if self.by_slug.contains_key(&slug) || self.repos.contains_key(&repo.id()) {
            return Err(RepoError::AlreadyExists(slug));
        }
        self.by_slug.insert(slug, repo.id());
        self.repos.insert(repo.id(), repo);
        Ok(())
    }
}

/// Claim on an `(owner, name)` pair while its repository is being created.
///
/// Dropping it without registering frees the pair again.
struct Reservation<'a> {
    index: &'a RepoIndexInner,
    slug: RepoSlug,
}

impl Reservation<'_> {
    fn register(self, repo: Repository) -> RepoResult<()> {
        // the guard is released before `self` drops and locks again
        let mut state = self.index.state.lock();
        state.pending.remove(&self.slug);
        state.insert(repo)
    }
}

impl Drop for Reservation<'_> {
    fn drop(&mut self) {
        self.index.state.lock().pending.remove(&self.slug);
    }
}

impl RepoIndex {
    /// An empty registry.
    pub fn new(workspace: Workspace) -> Self {
        Self::with_state(workspace, IndexState::default())
    }

    fn with_state(workspace: Workspace, state: IndexState) -> Self {
        Self {
            inner: Arc::new(RepoIndexInner {
                workspace,
                state: Mutex::new(state),
            }),
        }
    }

    pub fn workspace(&self) -> &Workspace {
        &self.inner.workspace
    }

    /// Create and initialize a repository, returning its id.
    ///
    /// The repository is registered only after its payload was produced
    /// and the mount released; a failed creation registers nothing.
    pub fn create_repo(&self, request: CreateRepo) -> RepoResult<RepoId> {
        let slug = RepoSlug::parse(&request.owner, &request.name)?;
        let reservation = self.reserve(slug.clone())?;

        let mut repo = Repository::new(slug.clone(), &request);
        if let Err(e) = repo.initialize(&self.inner.workspace) {
            warn!(repo = %slug, error = %e, "repository creation failed");
            return Err(e);
        }

        let id = repo.id();
        reservation.register(repo)?;
        info!(%id, repo = %slug, "repository registered");
        Ok(id)
    }

    fn reserve(&self, slug: RepoSlug) -> RepoResult<Reservation<'_>> {
        let mut state = self.inner.state.lock();
        if state.by_slug.contains_key(&slug) || state.pending.contains(&slug) {
            return Err(RepoError::AlreadyExists(slug));
        }
        state.pending.insert(slug.clone());
        Ok(Reservation {
            index: &self.inner,
            slug,
        })
    }

    /// id of the repository registered under `(owner, name)`
    pub fn find(&self, owner: &str, name: &str) -> RepoResult<RepoId> {
        let not_found = || RepoError::NotFound(format!("{}/{}", owner, name));
        let slug = RepoSlug::parse(owner, name).map_err(|_| not_found())?;
        self.inner
            .state
            .lock()
            .by_slug
            .get(&slug)
            .copied()
            .ok_or_else(not_found)
    }

    /// Descriptive fields of the repository registered under `(owner, name)`.
    pub fn get_repo(&self, owner: &str, name: &str) -> RepoResult<RepoInfo> {
        let id = self.find(owner, name)?;
        self.with_repo(&id, |repo| Ok(repo.info()))
    }

    /// all repositories, ordered by owner then name
    pub fn list_repos(&self) -> Vec<RepoInfo> {
        let mut repos: Vec<RepoInfo> = self
            .inner
            .state
            .lock()
            .repos
            .values()
            .map(Repository::info)
            .collect();
        repos.sort_by(|a, b| (&a.owner, &a.name).cmp(&(&b.owner, &b.name)));
        repos
    }

    /// snapshot of one repository
    pub fn repository(&self, id: &RepoId) -> RepoResult<Repository> {
        self.with_repo(id, |repo| Ok(repo.clone()))
    }

    fn with_repo<T>(
        &self,
        id: &RepoId,
        f: impl FnOnce(&Repository) -> RepoResult<T>,
    ) -> RepoResult<T> {
        let state = self.inner.state.lock();
        let repo = state
            .repos
            .get(id)
            .ok_or_else(|| RepoError::NotFound(id.to_string()))?;
        f(repo)
    }

    // Mount-backed reads work on a snapshot so the registry lock is not held
    // across filesystem and git work.

    /// See [`Repository::latest_codebase_metadata`].
    pub fn codebase_metadata(&self, id: &RepoId) -> RepoResult<CodebaseMetadata> {
        self.repository(id)?
            .latest_codebase_metadata(&self.inner.workspace)
    }

    /// See [`Repository::advertise_refs`].
    pub fn advertise_refs(&self, id: &RepoId) -> RepoResult<String> {
        self.repository(id)?.advertise_refs(&self.inner.workspace)
    }

    /// See [`Repository::list_files`].
    pub fn list_files(&self, id: &RepoId, reference: &str) -> RepoResult<Vec<String>> {
        self.repository(id)?
            .list_files(&self.inner.workspace, reference)
    }

    /// raw payload of a repository
    pub fn get_data(&self, id: &RepoId) -> RepoResult<Payload> {
        self.with_repo(id, |repo| Ok(repo.data().clone()))
    }

    /// Replace the raw payload of a repository.
    pub fn set_data(&self, id: &RepoId, payload: Payload) -> RepoResult<()> {
        let mut state = self.inner.state.lock();
        let repo = state
            .repos
            .get_mut(id)
            .ok_or_else(|| RepoError::NotFound(id.to_string()))?;
        repo.set_data(payload)
    }

    pub fn len(&self) -> usize {
        self.inner.state.lock().repos.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Write every repository record and then the id list.
    pub fn save(&self, store: &dyn ObjectStore) -> RepoResult<()> {
        let repos: Vec<Repository> = {
            let state = self.inner.state.lock();
            state.repos.values().cloned().collect()
        };

        let mut ids = Vec::with_capacity(repos.len());
        for repo in &repos {
            let key = record_key(&repo.id());
            let bytes = serde_json::to_vec(repo).map_err(|source| RepoError::Record {
                key: key.clone(),
                source,
            })?;
            store.set(&key, &bytes)?;
            ids.push(repo.id());
        }
        ids.sort();

        let bytes = serde_json::to_vec(&ids).map_err(|source| RepoError::Record {
            key: INDEX_KEY.to_string(),
            source,
        })?;
        store.set(INDEX_KEY, &bytes)?;
        debug!(repos = ids.len(), "index saved");
        Ok(())
    }

    /// Restore a registry written by [`save`](Self::save).
    ///
    /// A store without an index yields an empty registry.
    pub fn load(workspace: Workspace, store: &dyn ObjectStore) -> RepoResult<Self> {
        let ids: Vec<RepoId> = match store.get(INDEX_KEY)? {
            Some(bytes) => serde_json::from_slice(&bytes).map_err(|source| RepoError::Record {
                key: INDEX_KEY.to_string(),
                source,
            })?,
            None => Vec::new(),
        };

        let mut state = IndexState::default();
        for id in ids {
            let key = record_key(&id);
            let bytes = store
                .get(&key)?
                .ok_or_else(|| RepoError::NotFound(format!("record {}", key)))?;
            let repo: Repository =
                serde_json::from_slice(&bytes).map_err(|source| RepoError::Record {
                    key: key.clone(),
                    source,
                })?;
            if repo.id() != id {
                let reason = format!("record holds repository {}", repo.id());
                return Err(RepoError::Record {
                    source: serde_json::Error::custom(reason),
                    key,
                });
            }
            state.insert(repo)?;
        }

        debug!(repos = state.repos.len(), "index loaded");
        Ok(Self::with_state(workspace, state))
    }
}

impl std::fmt::Debug for RepoIndex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RepoIndex")
            .field("repos", &self.len())
            .field("workspace", &self.inner.workspace)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;
    use std::sync::atomic::{AtomicBool, Ordering};

    use crate::config::GitblockConfig;
    use crate::git::{
        Author, BranchRef, CommitId, CommitInfo, DirEntry, Git2Engine, GitError, GitOperations,
        GitResult, GitStep,
    };
    use crate::mount::{MountWait, Namespace};
    use crate::repo::projection::PlaceholderProjection;
    use crate::store::MemoryObjectStore;
    use tempfile::TempDir;

    fn setup() -> (TempDir, RepoIndex) {
        let dir = TempDir::new().unwrap();
        let config = GitblockConfig::default()
            .scratch_root(dir.path())
            .mount_wait(MountWait::Fail);
        let index = RepoIndex::new(Workspace::new(config).unwrap());
        (dir, index)
    }

    #[test]
    fn test_create_and_get() {
        let (_dir, index) = setup();
        let id = index
            .create_repo(CreateRepo::new("alice", "demo").description("a demo"))
            .unwrap();

        let info = index.get_repo("alice", "demo").unwrap();
        assert_eq!(info.id, id);
        assert_eq!(info.description, "a demo");
        assert_eq!(info.star_count, 0);
        assert_eq!(index.len(), 1);
    }

    #[test]
    fn test_duplicate_rejected() {
        let (_dir, index) = setup();
        let id = index.create_repo(CreateRepo::new("alice", "demo")).unwrap();

        let err = index.create_repo(CreateRepo::new("alice", "demo")).unwrap_err();
        assert!(matches!(err, RepoError::AlreadyExists(_)));
        assert_eq!(index.len(), 1);
        assert_eq!(index.find("alice", "demo").unwrap(), id);

        // same name, other owner
        index.create_repo(CreateRepo::new("bob", "demo")).unwrap();
        assert_eq!(index.len(), 2);
    }

    #[test]
    fn test_pending_creation_blocks_duplicate() {
        let (_dir, index) = setup();
        let slug = RepoSlug::parse("alice", "demo").unwrap();

        let reservation = index.reserve(slug.clone()).unwrap();
        let err = index.create_repo(CreateRepo::new("alice", "demo")).unwrap_err();
        assert!(matches!(err, RepoError::AlreadyExists(_)));

        drop(reservation);
        assert!(index.create_repo(CreateRepo::new("alice", "demo")).is_ok());
    }

    /// git2 engine whose commits fail while `broken` is set
    #[derive(Default)]
    struct BrokenCommits {
        inner: Git2Engine,
        broken: AtomicBool,
    }

    impl GitOperations for BrokenCommits {
        fn init_repository(&self, ns: &Namespace) -> GitResult<()> {
            self.inner.init_repository(ns)
        }

        fn create_branch(&self, ns: &Namespace, name: &str, checkout: bool) -> GitResult<()> {
            self.inner.create_branch(ns, name, checkout)
        }

        fn stage_file(&self, ns: &Namespace, filepath: &str) -> GitResult<()> {
            self.inner.stage_file(ns, filepath)
        }

        fn commit(&self, ns: &Namespace, message: &str, author: &Author) -> GitResult<CommitId> {
            if self.broken.load(Ordering::SeqCst) {
                return Err(GitError::InvalidArgument {
                    step: GitStep::Commit,
                    path: ns.path().to_path_buf(),
                    reason: "disk full".to_string(),
                });
            }
            self.inner.commit(ns, message, author)
        }

        fn list_tracked_files(&self, ns: &Namespace, reference: &str) -> GitResult<Vec<String>> {
            self.inner.list_tracked_files(ns, reference)
        }

        fn list_directory_at(&self, ns: &Namespace, relative: &Path) -> GitResult<Vec<DirEntry>> {
            self.inner.list_directory_at(ns, relative)
        }

        fn list_branches(&self, ns: &Namespace) -> GitResult<Vec<BranchRef>> {
            self.inner.list_branches(ns)
        }

        fn head_commit(&self, ns: &Namespace) -> GitResult<Option<CommitInfo>> {
            self.inner.head_commit(ns)
        }

        fn count_commits(&self, ns: &Namespace) -> GitResult<usize> {
            self.inner.count_commits(ns)
        }
    }

    #[test]
    fn test_failed_creation_registers_nothing() {
        let dir = TempDir::new().unwrap();
        let engine = Arc::new(BrokenCommits::default());
        engine.broken.store(true, Ordering::SeqCst);
        let config = GitblockConfig::default()
            .scratch_root(dir.path())
            .mount_wait(MountWait::Fail);
        let ws = Workspace::with_parts(config, engine.clone(), Arc::new(PlaceholderProjection))
            .unwrap();
        let index = RepoIndex::new(ws);

        let err = index.create_repo(CreateRepo::new("alice", "demo")).unwrap_err();
        match err {
            RepoError::GitOperationFailure(e) => assert_eq!(e.step(), GitStep::Commit),
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(index.len(), 0);
        assert!(index.get_repo("alice", "demo").unwrap_err().is_not_found());
        assert!(index.find("alice", "demo").unwrap_err().is_not_found());
        assert_eq!(index.workspace().mounts().active_mounts(), 0);

        // the pair is free again once git recovers
        engine.broken.store(false, Ordering::SeqCst);
        let id = index.create_repo(CreateRepo::new("alice", "demo")).unwrap();
        assert_eq!(index.len(), 1);
        assert_eq!(index.get_repo("alice", "demo").unwrap().id, id);
        assert!(!index.get_data(&id).unwrap().is_empty());
    }

    #[test]
    fn test_invalid_name_rejected() {
        let (_dir, index) = setup();
        let err = index.create_repo(CreateRepo::new("alice", "../demo")).unwrap_err();
        assert!(matches!(err, RepoError::InvalidName(_)));
        assert!(index.is_empty());
    }

    #[test]
    fn test_missing_repo() {
        let (_dir, index) = setup();
        assert!(index.get_repo("alice", "nothing").unwrap_err().is_not_found());
        assert!(index.get_repo("alice", "not/valid").unwrap_err().is_not_found());
        assert!(index.codebase_metadata(&RepoId::generate()).unwrap_err().is_not_found());
    }

    #[test]
    fn test_list_repos_sorted() {
        let (_dir, index) = setup();
        index.create_repo(CreateRepo::new("bob", "zeta")).unwrap();
        index.create_repo(CreateRepo::new("alice", "beta")).unwrap();
        index.create_repo(CreateRepo::new("alice", "alpha")).unwrap();

        let names: Vec<String> = index
            .list_repos()
            .into_iter()
            .map(|r| format!("{}/{}", r.owner, r.name))
            .collect();
        assert_eq!(names, vec!["alice/alpha", "alice/beta", "bob/zeta"]);
    }

    #[test]
    fn test_data_passthrough() {
        let (_dir, index) = setup();
        let a = index.create_repo(CreateRepo::new("alice", "a")).unwrap();
        let b = index.create_repo(CreateRepo::new("alice", "b")).unwrap();

        let payload = index.get_data(&a).unwrap();
        index.set_data(&b, payload.clone()).unwrap();
        assert_eq!(index.get_data(&b).unwrap(), payload);

        let err = index.set_data(&b, Payload::new(vec![1, 2, 3])).unwrap_err();
        assert!(matches!(err, RepoError::Serialization(_)));
        assert_eq!(index.get_data(&b).unwrap(), payload);
    }

    #[test]
    fn test_save_and_load() {
        let (dir, index) = setup();
        let id = index.create_repo(CreateRepo::new("alice", "demo")).unwrap();
        index.create_repo(CreateRepo::new("bob", "other")).unwrap();

        let store = MemoryObjectStore::new();
        index.save(&store).unwrap();
        assert!(store.get(&record_key(&id)).unwrap().is_some());

        let config = GitblockConfig::default().scratch_root(dir.path().join("reloaded"));
        let loaded = RepoIndex::load(Workspace::new(config).unwrap(), &store).unwrap();
        assert_eq!(loaded.list_repos(), index.list_repos());
        assert_eq!(loaded.get_data(&id).unwrap(), index.get_data(&id).unwrap());

        let metadata = loaded.codebase_metadata(&id).unwrap();
        assert!(metadata.files.contains_key("README.md"));

        // uniqueness survives the reload
        let err = loaded.create_repo(CreateRepo::new("alice", "demo")).unwrap_err();
        assert!(matches!(err, RepoError::AlreadyExists(_)));
    }

    #[test]
    fn test_load_empty_store() {
        let (dir, _index) = setup();
        let config = GitblockConfig::default().scratch_root(dir.path());
        let loaded = RepoIndex::load(Workspace::new(config).unwrap(), &MemoryObjectStore::new())
            .unwrap();
        assert!(loaded.is_empty());
    }

    #[test]
    fn test_load_missing_record() {
        let (dir, _index) = setup();
        let store = MemoryObjectStore::new();
        let ids = vec![RepoId::generate()];
        store.set(INDEX_KEY, &serde_json::to_vec(&ids).unwrap()).unwrap();

        let config = GitblockConfig::default().scratch_root(dir.path());
        let err = RepoIndex::load(Workspace::new(config).unwrap(), &store).unwrap_err();
        assert!(err.is_not_found());
    }
}
