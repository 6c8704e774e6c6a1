//! sync::engine
//!
//! The conflict-aware pull engine.
//!
//! # Strategy
//!
//! `update` runs a two-phase pull: rebase first (linear history), merge as
//! fallback. Some remote states are not rebase-able without conflict even
//! though a merge succeeds, so the fallback is worth a second network
//! round-trip; the reverse direction is not retried, a conflicting merge
//! is terminal.
//!
//! Before any pull the engine captures the current head. A conflicting
//! rebase is aborted in place (which restores HEAD by itself); a
//! conflicting merge leaves the index and worktree conflicted, so the
//! engine unwinds it with a hard reset to the saved head plus state
//! cleanup. Either way the repository is back at its pre-pull state when
//! [`SyncError::Conflict`] is reported.

use std::cell::RefCell;
use std::sync::Arc;

use crate::auth::{AuthSession, Authenticator, RemoteProtocol};
use crate::git::{GitError, Repository};

use super::SyncError;

/// Pull integration strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PullMode {
    /// Replay local commits onto the fetched remote tip.
    Rebase,
    /// Join local and remote tips with a merge commit.
    Merge,
}

/// Result of a single pull attempt.
///
/// A tagged outcome rather than an error: conflicts are an expected branch
/// of the state machine, not a failure of the operation itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PullOutcome {
    /// The pull integrated cleanly (or there was nothing to integrate).
    Success,
    /// The pull produced conflicts; the repository has been restored (or,
    /// for merge mode, must be restored by the caller via
    /// [`SyncEngine::undo_pull`]).
    Conflict,
}

/// Executes pull, push, and stash operations against one repository.
///
/// Holds the saved pre-pull head so a conflicting pull can be unwound.
/// Not safe for concurrent use; the caller serializes operations per
/// repository.
pub struct SyncEngine {
    auth: Authenticator,
    session: Arc<AuthSession>,
    remote: String,
    protocol: RemoteProtocol,
    saved_head: Option<git2::Oid>,
    pull_attempted: bool,
}

impl SyncEngine {
    /// Create an engine for the given remote.
    pub fn new(
        auth: Authenticator,
        session: Arc<AuthSession>,
        remote: String,
        protocol: RemoteProtocol,
    ) -> Self {
        Self {
            auth,
            session,
            remote,
            protocol,
            saved_head: None,
            pull_attempted: false,
        }
    }

    /// Pull remote changes, trying rebase first and merge second.
    ///
    /// # Errors
    ///
    /// - [`SyncError::Conflict`] if both strategies conflict; the
    ///   repository has been rolled back to the pre-pull head
    /// - [`SyncError::RollbackFailed`] if that rollback itself failed;
    ///   the repository is left as-is
    /// - [`SyncError::Transport`] on fetch failures
    pub fn update(&mut self, repo: &Repository) -> Result<(), SyncError> {
        match self.pull(repo, PullMode::Rebase)? {
            PullOutcome::Success => {
                tracing::debug!("pull with rebase was successful");
                return Ok(());
            }
            PullOutcome::Conflict => {
                tracing::debug!("pull with rebase conflicted; retrying with merge strategy");
            }
        }

        match self.pull(repo, PullMode::Merge)? {
            PullOutcome::Success => {
                tracing::debug!("pull with merge strategy was successful");
                Ok(())
            }
            PullOutcome::Conflict => {
                tracing::debug!("pull with merge strategy conflicted; rolling back");
                if let Err(rollback) = self.undo_pull(repo) {
                    return Err(SyncError::RollbackFailed {
                        message: format!(
                            "pull produced conflicts and the rollback did not complete: {}",
                            rollback
                        ),
                    });
                }
                Err(SyncError::Conflict)
            }
        }
    }

    /// Run a single pull attempt with the given strategy.
    ///
    /// Captures the pre-pull head, fetches, and integrates the remote
    /// counterpart of the current branch. A successful fetch marks the
    /// protocol verified in the session regardless of how integration
    /// ends: reaching the remote proves the credentials.
    pub fn pull(&mut self, repo: &Repository, mode: PullMode) -> Result<PullOutcome, SyncError> {
        self.saved_head = repo.head_oid()?;
        self.pull_attempted = true;

        self.fetch(repo)?;
        self.session.mark_verified(self.protocol);

        let branch = self.current_branch(repo)?;
        let tracking = format!("refs/remotes/{}/{}", self.remote, branch);
        let upstream_oid = match repo.raw().refname_to_id(&tracking) {
            Ok(oid) => oid,
            Err(e) if e.code() == git2::ErrorCode::NotFound => {
                tracing::debug!(remote = %self.remote, %branch, "remote has no counterpart branch; nothing to integrate");
                return Ok(PullOutcome::Success);
            }
            Err(e) => return Err(GitError::from(e).into()),
        };

        let upstream = repo
            .raw()
            .find_annotated_commit(upstream_oid)
            .map_err(GitError::from)?;
        let (analysis, _) = repo
            .raw()
            .merge_analysis(&[&upstream])
            .map_err(GitError::from)?;

        if analysis.is_up_to_date() {
            tracing::debug!("already up to date");
            return Ok(PullOutcome::Success);
        }

        if analysis.is_unborn() || analysis.is_fast_forward() {
            self.fast_forward(repo, &branch, upstream_oid)?;
            tracing::debug!(%branch, "fast-forwarded to remote tip");
            return Ok(PullOutcome::Success);
        }

        match mode {
            PullMode::Rebase => self.rebase_onto(repo, &upstream),
            PullMode::Merge => self.merge_from(repo, &upstream, &branch),
        }
    }

    /// Undo the latest pull by hard resetting to the saved head.
    ///
    /// Also clears any in-progress merge state. Only valid after a pull
    /// was attempted through this engine instance.
    pub fn undo_pull(&mut self, repo: &Repository) -> Result<(), SyncError> {
        let Some(head) = self.saved_head.filter(|_| self.pull_attempted) else {
            return Err(SyncError::RollbackFailed {
                message: "cannot undo pull: no previous head recorded".into(),
            });
        };

        repo.reset_hard(head)?;
        tracing::debug!("last pull undone (hard reset to previous head)");
        Ok(())
    }

    /// Push the current branch to the configured remote.
    ///
    /// # Errors
    ///
    /// - [`SyncError::Transport`] on network/authentication failure or a
    ///   rejected ref update (push failures do not mutate local history)
    pub fn push(&self, repo: &Repository) -> Result<(), SyncError> {
        let branch = self.current_branch(repo)?;
        let mut remote =
            repo.raw()
                .find_remote(&self.remote)
                .map_err(|e| SyncError::Transport {
                    message: format!("remote '{}' not found: {}", self.remote, e.message()),
                })?;

        let refspec = format!("refs/heads/{branch}:refs/heads/{branch}");
        let rejection: RefCell<Option<String>> = RefCell::new(None);

        {
            let mut callbacks = self.auth.callbacks();
            callbacks.push_update_reference(|_refname, status| {
                if let Some(msg) = status {
                    *rejection.borrow_mut() = Some(msg.to_string());
                }
                Ok(())
            });

            let mut opts = git2::PushOptions::new();
            opts.remote_callbacks(callbacks);

            remote
                .push(&[refspec.as_str()], Some(&mut opts))
                .map_err(|e| SyncError::Transport {
                    message: e.message().to_string(),
                })?;
        }

        if let Some(message) = rejection.into_inner() {
            return Err(SyncError::Transport { message });
        }

        self.session.mark_verified(self.protocol);
        tracing::debug!(remote = %self.remote, %branch, "pushed");
        Ok(())
    }

    /// Stash the current worktree changes (untracked files excluded).
    pub fn stash(&self, repo: &mut Repository) -> Result<(), SyncError> {
        let sig = repo.signature()?;
        repo.raw_mut()
            .stash_save(&sig, "bibsync: shelved changes", None)
            .map_err(GitError::from)?;
        tracing::debug!("current changes stashed");
        Ok(())
    }

    /// Re-apply the most recent stash entry.
    pub fn apply_latest_stash(&self, repo: &mut Repository) -> Result<(), SyncError> {
        repo.raw_mut()
            .stash_apply(0, None)
            .map_err(GitError::from)?;
        tracing::debug!("stash applied");
        Ok(())
    }

    // =========================================================================
    // Internals
    // =========================================================================

    fn current_branch(&self, repo: &Repository) -> Result<String, SyncError> {
        repo.current_branch()?.ok_or_else(|| {
            SyncError::Git(GitError::Internal {
                message: "HEAD is detached; cannot synchronize".into(),
            })
        })
    }

    /// Fetch the remote's configured refspecs with authentication.
    fn fetch(&self, repo: &Repository) -> Result<(), SyncError> {
        let mut remote =
            repo.raw()
                .find_remote(&self.remote)
                .map_err(|e| SyncError::Transport {
                    message: format!("remote '{}' not found: {}", self.remote, e.message()),
                })?;

        let mut opts = git2::FetchOptions::new();
        opts.remote_callbacks(self.auth.callbacks());

        remote
            .fetch(&[] as &[&str], Some(&mut opts), None)
            .map_err(|e| SyncError::Transport {
                message: e.message().to_string(),
            })?;

        Ok(())
    }

    /// Advance the branch ref to `target` and check out the result.
    fn fast_forward(
        &self,
        repo: &Repository,
        branch: &str,
        target: git2::Oid,
    ) -> Result<(), SyncError> {
        let raw = repo.raw();
        let refname = format!("refs/heads/{branch}");

        match raw.find_reference(&refname) {
            Ok(mut reference) => {
                reference
                    .set_target(target, "pull: fast-forward")
                    .map_err(GitError::from)?;
            }
            Err(e) if e.code() == git2::ErrorCode::NotFound => {
                raw.reference(&refname, target, true, "pull: fast-forward")
                    .map_err(GitError::from)?;
            }
            Err(e) => return Err(GitError::from(e).into()),
        }

        raw.set_head(&refname).map_err(GitError::from)?;
        raw.checkout_head(Some(git2::build::CheckoutBuilder::default().force()))
            .map_err(GitError::from)?;
        Ok(())
    }

    /// Rebase HEAD onto the fetched upstream.
    ///
    /// On conflict the rebase is aborted, which restores HEAD to the
    /// pre-pull state by itself.
    fn rebase_onto(
        &self,
        repo: &Repository,
        upstream: &git2::AnnotatedCommit,
    ) -> Result<PullOutcome, SyncError> {
        let raw = repo.raw();
        let sig = repo.signature()?;

        let mut rebase = raw
            .rebase(None, Some(upstream), None, None)
            .map_err(GitError::from)?;

        while let Some(op) = rebase.next() {
            op.map_err(GitError::from)?;

            if raw.index().map_err(GitError::from)?.has_conflicts() {
                tracing::debug!("rebase produced conflicts; aborting");
                rebase.abort().map_err(GitError::from)?;
                return Ok(PullOutcome::Conflict);
            }

            match rebase.commit(None, &sig, None) {
                Ok(_) => {}
                // A patch that is already present upstream produces an
                // empty commit step; skip it.
                Err(e) if e.code() == git2::ErrorCode::Applied => {}
                Err(e) => return Err(GitError::from(e).into()),
            }
        }

        rebase.finish(Some(&sig)).map_err(GitError::from)?;
        Ok(PullOutcome::Success)
    }

    /// Merge the fetched upstream into HEAD.
    ///
    /// On conflict the merge state is left in place; the caller unwinds it
    /// through [`SyncEngine::undo_pull`] (hard reset + state cleanup),
    /// because a failed plain merge does not self-clean the working tree.
    fn merge_from(
        &self,
        repo: &Repository,
        upstream: &git2::AnnotatedCommit,
        branch: &str,
    ) -> Result<PullOutcome, SyncError> {
        let raw = repo.raw();

        let mut checkout = git2::build::CheckoutBuilder::default();
        checkout.allow_conflicts(true).conflict_style_merge(true);
        raw.merge(
            &[upstream],
            Some(&mut git2::MergeOptions::new()),
            Some(&mut checkout),
        )
        .map_err(GitError::from)?;

        if raw.index().map_err(GitError::from)?.has_conflicts() {
            tracing::debug!("merge produced conflicts");
            return Ok(PullOutcome::Conflict);
        }

        let mut index = raw.index().map_err(GitError::from)?;
        let tree_id = index.write_tree().map_err(GitError::from)?;
        let tree = raw.find_tree(tree_id).map_err(GitError::from)?;

        let head_commit = raw
            .head()
            .and_then(|h| h.peel_to_commit())
            .map_err(GitError::from)?;
        let upstream_commit = raw.find_commit(upstream.id()).map_err(GitError::from)?;
        let sig = repo.signature()?;

        let message = format!("Merge remote-tracking branch '{}/{}'", self.remote, branch);
        raw.commit(
            Some("HEAD"),
            &sig,
            &sig,
            &message,
            &tree,
            &[&head_commit, &upstream_commit],
        )
        .map_err(GitError::from)?;

        raw.cleanup_state().map_err(GitError::from)?;

        Ok(PullOutcome::Success)
    }
}

impl std::fmt::Debug for SyncEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SyncEngine")
            .field("remote", &self.remote)
            .field("protocol", &self.protocol)
            .field("saved_head", &self.saved_head)
            .finish()
    }
}
