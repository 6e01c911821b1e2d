//! Commit data attached to codebase listings.

use chrono::Utc;

use crate::git::{GitOperations, GitResult};
use crate::mount::Namespace;
use crate::repo::types::LatestCommit;

/// short hash reported when there is no real commit to name
pub const PLACEHOLDER_SHORT_HASH: &str = "0000000";

/// message reported by [`PlaceholderProjection`]
pub const PLACEHOLDER_MESSAGE: &str = "Initial commit";

/// Commit fields of a codebase listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommitSummary {
    pub latest: LatestCommit,
    pub total_commits: usize,
}

/// Produces the commit fields of a codebase listing.
///
/// Runs while the repository is mounted, so implementations may query the
/// git facade. Swapping the projection never touches mount or codec logic.
pub trait CommitProjection: Send + Sync {
    fn project(&self, git: &dyn GitOperations, ns: &Namespace) -> GitResult<CommitSummary>;
}

/// Fixed commit data: one commit named "Initial commit", dated now.
#[derive(Debug, Clone, Copy, Default)]
pub struct PlaceholderProjection;

impl CommitProjection for PlaceholderProjection {
    fn project(&self, _git: &dyn GitOperations, _ns: &Namespace) -> GitResult<CommitSummary> {
        Ok(CommitSummary {
            latest: LatestCommit {
                message: PLACEHOLDER_MESSAGE.to_string(),
                date: Utc::now(),
                short_hash: PLACEHOLDER_SHORT_HASH.to_string(),
            },
            total_commits: 1,
        })
    }
}

/// Reads the HEAD commit and history length through the git facade.
///
/// An empty repository reports zero commits, an empty message and the
/// placeholder hash.
#[derive(Debug, Clone, Copy, Default)]
pub struct HeadCommitProjection;

impl CommitProjection for HeadCommitProjection {
    fn project(&self, git: &dyn GitOperations, ns: &Namespace) -> GitResult<CommitSummary> {
        let latest = match git.head_commit(ns)? {
            Some(head) => LatestCommit {
                message: head.summary().to_string(),
                date: head.timestamp,
                short_hash: head.id.short(),
            },
            None => LatestCommit {
                message: String::new(),
                date: Utc::now(),
                short_hash: PLACEHOLDER_SHORT_HASH.to_string(),
            },
        };
        let total_commits = git.count_commits(ns)?;
        Ok(CommitSummary {
            latest,
            total_commits,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::block::BlockStore;
    use crate::git::{Author, Git2Engine};
    use crate::mount::{MountConfig, MountManager};
    use crate::types::RepoId;

    #[test]
    fn test_placeholder_ignores_history() {
        let manager = MountManager::new(MountConfig::default()).unwrap();
        let guard = manager.mount(RepoId::generate(), &BlockStore::new()).unwrap();

        let summary = PlaceholderProjection
            .project(&Git2Engine::new(), guard.namespace())
            .unwrap();
        assert_eq!(summary.total_commits, 1);
        assert_eq!(summary.latest.message, "Initial commit");
        assert_eq!(summary.latest.short_hash, "0000000");
    }

    #[test]
    fn test_head_projection_reads_commit() {
        let manager = MountManager::new(MountConfig::default()).unwrap();
        let guard = manager.mount(RepoId::generate(), &BlockStore::new()).unwrap();
        let ns = guard.namespace();
        let git = Git2Engine::new();

        let empty = HeadCommitProjection.project(&git, ns);
        // not a repository yet
        assert!(empty.is_err());

        git.init_repository(ns).unwrap();
        let empty = HeadCommitProjection.project(&git, ns).unwrap();
        assert_eq!(empty.total_commits, 0);

        git.create_branch(ns, "main", true).unwrap();
        ns.write_file("a.txt", b"a").unwrap();
        git.stage_file(ns, "a.txt").unwrap();
        let id = git
            .commit(ns, "Add a\n\nlonger body", &Author::gitblock())
            .unwrap();

        let summary = HeadCommitProjection.project(&git, ns).unwrap();
        assert_eq!(summary.total_commits, 1);
        assert_eq!(summary.latest.message, "Add a");
        assert_eq!(summary.latest.short_hash, id.short());
    }
}
