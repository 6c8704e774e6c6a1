//! sync::manager
//!
//! The synchronization orchestrator and public surface.

use std::path::Path;
use std::sync::Arc;

use crate::auth::{AuthSession, Authenticator, RemoteProtocol};
use crate::config::SyncPreferences;
use crate::git::{self, Repository};
use crate::monitor::ChangeMonitor;
use crate::ui::CredentialPrompt;

use super::engine::SyncEngine;
use super::throttle::PushThrottle;
use super::SyncError;

/// Commit message used for automatic synchronization commits.
pub const AUTO_COMMIT_MESSAGE: &str = "Automatic update via bibsync";

/// Keeps one tracked database file in sync with its git remote.
///
/// Owns the repository handle and composes the status, staging, pull, and
/// throttle machinery into the synchronize sequence. One manager per
/// repository; operations block the calling thread and must be serialized
/// by the caller (run them off any interactive thread).
///
/// # Example
///
/// ```no_run
/// use std::path::Path;
/// use std::sync::Arc;
/// use bibsync::auth::AuthSession;
/// use bibsync::config::SyncPreferences;
/// use bibsync::sync::SyncManager;
///
/// let session = Arc::new(AuthSession::new());
/// let prefs = SyncPreferences::load().unwrap();
/// let mut manager = SyncManager::open(Path::new("library/refs.bib"), prefs, session).unwrap();
///
/// if manager.should_synchronize() {
///     manager.synchronize(Path::new("library/refs.bib")).unwrap();
/// }
/// ```
pub struct SyncManager {
    repo: Repository,
    prefs: SyncPreferences,
    session: Arc<AuthSession>,
    engine: SyncEngine,
    throttle: PushThrottle,
    protocol: RemoteProtocol,
}

impl SyncManager {
    /// Check whether `path` lies inside a git repository.
    pub fn is_repository(path: &Path) -> bool {
        git::is_repository(path)
    }

    /// Open the repository containing `path`.
    ///
    /// # Errors
    ///
    /// - [`SyncError::NotARepository`] if no ancestor of `path` is one
    pub fn open(
        path: &Path,
        prefs: SyncPreferences,
        session: Arc<AuthSession>,
    ) -> Result<Self, SyncError> {
        let repo = Repository::open(path)?;
        Ok(Self::with_repository(repo, prefs, session))
    }

    /// Initialize a repository at `path` (initial branch `main`).
    ///
    /// # Errors
    ///
    /// - [`SyncError::AlreadyARepository`] if `path` already is one
    pub fn init(
        path: &Path,
        prefs: SyncPreferences,
        session: Arc<AuthSession>,
    ) -> Result<Self, SyncError> {
        let repo = Repository::init(path)?;
        Ok(Self::with_repository(repo, prefs, session))
    }

    fn with_repository(
        repo: Repository,
        prefs: SyncPreferences,
        session: Arc<AuthSession>,
    ) -> Self {
        let remote = prefs.remote().to_string();
        let protocol = match repo.remote_url(&remote) {
            Ok(Some(url)) => RemoteProtocol::from_url(&url),
            Ok(None) => RemoteProtocol::Unknown,
            Err(e) => {
                tracing::warn!(error = %e, "failed to determine remote protocol");
                RemoteProtocol::Unknown
            }
        };
        tracing::debug!(%protocol, %remote, "remote protocol detected");

        let auth = Authenticator::new(&prefs, Arc::clone(&session));
        let engine = SyncEngine::new(auth, Arc::clone(&session), remote, protocol);

        Self {
            repo,
            prefs,
            session,
            engine,
            throttle: PushThrottle::new(),
            protocol,
        }
    }

    /// The repository's worktree root.
    pub fn root(&self) -> &Path {
        self.repo.root()
    }

    /// The detected transport protocol of the configured remote.
    pub fn protocol(&self) -> RemoteProtocol {
        self.protocol
    }

    /// The underlying repository handle.
    pub fn repository(&self) -> &Repository {
        &self.repo
    }

    /// Policy gate: decide whether this synchronize request should
    /// actually run. See [`PushThrottle::should_synchronize`].
    pub fn should_synchronize(&mut self) -> bool {
        self.throttle.should_synchronize(&self.prefs)
    }

    /// Check whether `path` has changes that a synchronize would commit.
    pub fn has_uncommitted_changes(&self, path: &Path) -> Result<bool, SyncError> {
        let resolved = self.repo.resolve(path);
        Ok(self.repo.untracked_files()?.contains(&resolved))
    }

    /// Run the full synchronize sequence for `path`.
    ///
    /// 1. Fail with [`SyncError::NoChanges`] when `path` has nothing to
    ///    commit.
    /// 2. Unstage any leftover staged files, so the commit contains
    ///    exactly this file's change set.
    /// 3. Stage `path` (redirected to its enclosing untracked folder when
    ///    necessary).
    /// 4. Commit with the fixed automatic message.
    /// 5. Pull remote changes (rebase, then merge fallback).
    /// 6. Push to the configured remote.
    ///
    /// Any failing step aborts the rest and surfaces its error. Steps
    /// already completed are not rolled back here; only the pull sub-step
    /// has its own rollback.
    pub fn synchronize(&mut self, path: &Path) -> Result<(), SyncError> {
        if !self.has_uncommitted_changes(path)? {
            tracing::debug!(path = %path.display(), "no changes detected; skipping git operations");
            return Err(SyncError::NoChanges {
                path: path.to_path_buf(),
            });
        }

        let tracked = self.repo.tracked_files()?;
        if !tracked.is_empty() {
            self.repo.unstage_all(&tracked)?;
        }

        self.repo.stage(path)?;
        tracing::debug!(path = %path.display(), "file added to staging area");

        self.repo.commit(AUTO_COMMIT_MESSAGE, false)?;
        tracing::info!(path = %path.display(), "committed changes");

        self.engine.update(&self.repo)?;

        self.engine.push(&self.repo)?;
        tracing::debug!(path = %path.display(), "pushed successfully");

        self.session.mark_verified(self.protocol);
        Ok(())
    }

    /// [`SyncManager::synchronize`] bracketed by the application's change
    /// monitor: notifications pause before the sync and resume after its
    /// own writes have been accepted, so they are not reported back as
    /// external changes.
    pub fn synchronize_watched(
        &mut self,
        path: &Path,
        monitor: &dyn ChangeMonitor,
    ) -> Result<(), SyncError> {
        monitor.pause();
        let result = self.synchronize(path);
        monitor.accept_pending_changes();
        monitor.resume();
        result
    }

    /// Pull remote changes: rebase first, merge fallback, rollback on a
    /// double conflict. See [`SyncEngine::update`].
    pub fn update(&mut self) -> Result<(), SyncError> {
        self.engine.update(&self.repo)
    }

    /// Undo the latest pull by hard resetting to the head recorded before
    /// it. See [`SyncEngine::undo_pull`].
    pub fn undo_pull(&mut self) -> Result<(), SyncError> {
        self.engine.undo_pull(&self.repo)
    }

    /// Shelve current worktree changes.
    pub fn stash(&mut self) -> Result<(), SyncError> {
        self.engine.stash(&mut self.repo)
    }

    /// Re-apply the most recent stash entry.
    pub fn apply_latest_stash(&mut self) -> Result<(), SyncError> {
        self.engine.apply_latest_stash(&mut self.repo)
    }

    /// Prompt for the runtime secret the detected protocol needs, unless
    /// the protocol's credentials already proved themselves or the
    /// relevant secret is not encrypted.
    ///
    /// A cancelled prompt stores `None`; the next transport operation will
    /// then fail authentication and can trigger a re-prompt.
    pub fn prompt_for_credentials_if_needed(&self, prompt: &dyn CredentialPrompt) {
        match self.protocol {
            RemoteProtocol::Ssh => {
                if self.prefs.ssh_key_encrypted() && !self.session.is_verified(RemoteProtocol::Ssh)
                {
                    self.session.set_ssh_passphrase(
                        prompt.request_secret("Enter passphrase for your SSH key"),
                    );
                }
            }
            RemoteProtocol::Https => {
                if self.prefs.password_encrypted()
                    && !self.session.is_verified(RemoteProtocol::Https)
                {
                    self.session
                        .set_password_key(prompt.request_secret("Enter password encryption key"));
                }
            }
            RemoteProtocol::Unknown => {}
        }
    }

}

impl std::fmt::Debug for SyncManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SyncManager")
            .field("root", &self.repo.root())
            .field("protocol", &self.protocol)
            .finish()
    }
}
