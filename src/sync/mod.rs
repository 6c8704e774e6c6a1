//! sync
//!
//! The synchronization core.
//!
//! # Components
//!
//! - [`SyncEngine`] - two-phase pull (rebase first, merge fallback) with
//!   saved-head rollback, plus push and stash operations
//! - [`PushThrottle`] - decides whether a synchronize request actually
//!   contacts the remote, based on the configured frequency
//! - [`SyncManager`] - the orchestrator and public surface: open/init,
//!   change detection, the full synchronize sequence, credential prompting
//!
//! # Error taxonomy
//!
//! [`SyncError`] distinguishes "nothing to do" ([`SyncError::NoChanges`])
//! from "requires user action" ([`SyncError::Conflict`]) from "transient,
//! retryable" ([`SyncError::Transport`]). Errors are never silently
//! swallowed; rollback double-failures surface as
//! [`SyncError::RollbackFailed`] and are never retried automatically.

mod engine;
mod manager;
mod throttle;

pub use engine::{PullMode, PullOutcome, SyncEngine};
pub use manager::{SyncManager, AUTO_COMMIT_MESSAGE};
pub use throttle::PushThrottle;

use std::path::PathBuf;

use thiserror::Error;

use crate::git::GitError;

/// Errors from synchronization operations.
#[derive(Debug, Error)]
pub enum SyncError {
    /// Path has no git metadata directory in any ancestor.
    #[error("not a git repository: {path}")]
    NotARepository {
        /// The path that was searched
        path: PathBuf,
    },

    /// Init requested on an existing repository.
    #[error("already a git repository: {path}")]
    AlreadyARepository {
        /// The offending path
        path: PathBuf,
    },

    /// Stage/unstage target not under the repository root.
    #[error("path not inside repository: {path}")]
    PathOutsideRepository {
        /// The offending path
        path: PathBuf,
    },

    /// Synchronize requested with nothing to commit.
    #[error("no changes detected in {path}")]
    NoChanges {
        /// The tracked file
        path: PathBuf,
    },

    /// Both rebase and merge pull strategies produced conflicts. The
    /// repository has been rolled back to its pre-pull state; conflicts
    /// must be resolved manually before retrying.
    #[error("pull resulted in conflicts; resolve manually and retry")]
    Conflict,

    /// Authentication or network failure during fetch or push.
    #[error("transport failure: {message}")]
    Transport {
        /// Description from the transport layer
        message: String,
    },

    /// Invalid configured push frequency.
    #[error("policy violation: {message}")]
    PolicyViolation {
        /// Description of the violated policy
        message: String,
    },

    /// A rollback after a conflicting pull itself failed. The repository
    /// is left as-is and needs manual attention.
    #[error("rollback failed: {message}")]
    RollbackFailed {
        /// Both the original condition and the rollback failure
        message: String,
    },

    /// Underlying git failure.
    #[error(transparent)]
    Git(GitError),
}

impl From<GitError> for SyncError {
    fn from(err: GitError) -> Self {
        match err {
            GitError::NotARepo { path } => SyncError::NotARepository { path },
            GitError::AlreadyARepo { path } => SyncError::AlreadyARepository { path },
            GitError::PathOutsideRepo { path } => SyncError::PathOutsideRepository { path },
            other => SyncError::Git(other),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn git_errors_map_to_public_taxonomy() {
        let err: SyncError = GitError::NotARepo {
            path: PathBuf::from("/tmp/x"),
        }
        .into();
        assert!(matches!(err, SyncError::NotARepository { .. }));

        let err: SyncError = GitError::AlreadyARepo {
            path: PathBuf::from("/tmp/x"),
        }
        .into();
        assert!(matches!(err, SyncError::AlreadyARepository { .. }));

        let err: SyncError = GitError::PathOutsideRepo {
            path: PathBuf::from("/tmp/x"),
        }
        .into();
        assert!(matches!(err, SyncError::PathOutsideRepository { .. }));

        let err: SyncError = GitError::BareRepo.into();
        assert!(matches!(err, SyncError::Git(_)));
    }

    #[test]
    fn display_distinguishes_categories() {
        let conflict = SyncError::Conflict.to_string();
        assert!(conflict.contains("resolve manually"));

        let transport = SyncError::Transport {
            message: "connection refused".into(),
        }
        .to_string();
        assert!(transport.contains("connection refused"));
    }
}
