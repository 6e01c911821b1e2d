//! Git facade error types.

use std::path::PathBuf;

use thiserror::Error;

use crate::git::types::GitStep;

/// A git operation failed.
///
/// Every variant names the step that failed and the namespace it ran
/// against, so a failed creation sequence can be traced to its stage.
#[derive(Debug, Error)]
pub enum GitError {
    /// error from the underlying git library
    #[error("git {step} failed in {}: {source}", path.display())]
    Engine {
        step: GitStep,
        path: PathBuf,
        #[source]
        source: git2::Error,
    },

    /// the namespace was not mounted when the operation ran
    #[error("git {step} failed in {}: namespace is not mounted", path.display())]
    NotMounted { step: GitStep, path: PathBuf },

    /// invalid argument (branch name, file path, ...)
    #[error("git {step} failed in {}: {reason}", path.display())]
    InvalidArgument {
        step: GitStep,
        path: PathBuf,
        reason: String,
    },

    /// filesystem error while inspecting the namespace
    #[error("git {step} failed in {}: {source}", path.display())]
    Io {
        step: GitStep,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// the engine cannot perform this operation on the namespace
    #[error("git {step} is not supported by this engine")]
    Unsupported { step: GitStep },
}

impl GitError {
    /// step that failed
    pub fn step(&self) -> GitStep {
        match self {
            GitError::Engine { step, .. }
            | GitError::NotMounted { step, .. }
            | GitError::InvalidArgument { step, .. }
            | GitError::Io { step, .. }
            | GitError::Unsupported { step } => *step,
        }
    }

    /// check if the caller should fall back to another operation
    pub fn is_unsupported(&self) -> bool {
        matches!(self, GitError::Unsupported { .. })
    }
}

/// result type alias for git operations
pub type GitResult<T> = Result<T, GitError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_carries_step() {
        let err = GitError::NotMounted {
            step: GitStep::Commit,
            path: PathBuf::from("/scratch/repo-x"),
        };
        assert_eq!(err.step(), GitStep::Commit);
        assert_eq!(
            err.to_string(),
            "git commit failed in /scratch/repo-x: namespace is not mounted"
        );
        assert!(!err.is_unsupported());
    }
}
