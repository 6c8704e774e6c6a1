//! git::repository
//!
//! The repository handle and the git error taxonomy.
//!
//! [`Repository`] wraps an opened `git2::Repository` together with its
//! canonicalized worktree root. It is the owner of the underlying handle:
//! one instance per opened repository, closed on drop. The root path is
//! guaranteed to contain the `.git` metadata directory for the lifetime of
//! the handle.

use std::path::{Path, PathBuf};

use thiserror::Error;

use super::locator::find_repository_root;

/// Errors from git operations.
///
/// These variants cover the failure categories the synchronization core
/// needs to handle distinctly; everything else is normalized into
/// [`GitError::Internal`].
#[derive(Debug, Error)]
pub enum GitError {
    /// No `.git` metadata directory in `path` or any ancestor.
    #[error("not a git repository: {path}")]
    NotARepo {
        /// The path that was searched
        path: PathBuf,
    },

    /// Init requested on a path that is already inside a repository.
    #[error("already a git repository: {path}")]
    AlreadyARepo {
        /// The offending path
        path: PathBuf,
    },

    /// Repository is bare (no working directory).
    #[error("bare repository not supported")]
    BareRepo,

    /// Requested ref does not exist.
    #[error("ref not found: {refname}")]
    RefNotFound {
        /// The ref that was not found
        refname: String,
    },

    /// HEAD has no commit yet (freshly initialized repository).
    #[error("repository has no commits yet")]
    UnbornHead,

    /// Stage/unstage target lies outside the repository root.
    #[error("path not inside repository: {path}")]
    PathOutsideRepo {
        /// The offending path
        path: PathBuf,
    },

    /// Permission or filesystem error.
    #[error("repository access error: {message}")]
    AccessError {
        /// Description of the error
        message: String,
    },

    /// Internal git2 error.
    #[error("git error: {message}")]
    Internal {
        /// The error message
        message: String,
    },
}

impl From<git2::Error> for GitError {
    fn from(err: git2::Error) -> Self {
        match err.code() {
            git2::ErrorCode::NotFound => GitError::RefNotFound {
                refname: err.message().to_string(),
            },
            git2::ErrorCode::UnbornBranch => GitError::UnbornHead,
            git2::ErrorCode::Locked => GitError::AccessError {
                message: format!("repository is locked: {}", err.message()),
            },
            _ => GitError::Internal {
                message: err.message().to_string(),
            },
        }
    }
}

/// State of in-progress git operations.
///
/// A repository that is mid-rebase or mid-merge needs user intervention
/// (or an explicit rollback) before further synchronization is possible.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GitState {
    /// No operation in progress.
    Clean,
    /// Rebase in progress.
    Rebase,
    /// Merge in progress.
    Merge,
    /// Cherry-pick in progress.
    CherryPick,
    /// Revert in progress.
    Revert,
    /// Bisect in progress.
    Bisect,
    /// Apply mailbox in progress.
    ApplyMailbox,
}

impl GitState {
    /// Check if any operation is in progress.
    pub fn is_in_progress(&self) -> bool {
        !matches!(self, GitState::Clean)
    }

    /// Get a human-readable description of the state.
    pub fn description(&self) -> &'static str {
        match self {
            GitState::Clean => "clean",
            GitState::Rebase => "rebase",
            GitState::Merge => "merge",
            GitState::CherryPick => "cherry-pick",
            GitState::Revert => "revert",
            GitState::Bisect => "bisect",
            GitState::ApplyMailbox => "apply-mailbox",
        }
    }
}

impl std::fmt::Display for GitState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.description())
    }
}

/// An opened repository plus its worktree root.
///
/// This is the handle every other component operates on. Classification
/// queries ([`Repository::untracked_files`] and friends) and staging
/// operations live in sibling modules but are methods on this type, so the
/// whole git surface stays behind one doorway.
pub struct Repository {
    /// The underlying git2 repository
    repo: git2::Repository,
    /// Canonicalized worktree root
    work_dir: PathBuf,
}

impl std::fmt::Debug for Repository {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Repository")
            .field("work_dir", &self.work_dir)
            .finish()
    }
}

impl Repository {
    // =========================================================================
    // Opening and initializing
    // =========================================================================

    /// Open the repository containing `path`.
    ///
    /// Walks up from `path` to find the repository root, so `path` can be
    /// the tracked file itself or any directory inside the repository.
    ///
    /// # Errors
    ///
    /// - [`GitError::NotARepo`] if no ancestor contains `.git`
    /// - [`GitError::BareRepo`] if the repository has no working directory
    pub fn open(path: &Path) -> Result<Self, GitError> {
        let root = find_repository_root(path).ok_or_else(|| GitError::NotARepo {
            path: path.to_path_buf(),
        })?;

        let repo = git2::Repository::open(&root)?;
        Self::from_git2(repo)
    }

    /// Initialize a new repository at `path` with initial branch `main`.
    ///
    /// # Errors
    ///
    /// - [`GitError::AlreadyARepo`] if `path` is already inside a repository
    pub fn init(path: &Path) -> Result<Self, GitError> {
        if find_repository_root(path).is_some() {
            return Err(GitError::AlreadyARepo {
                path: path.to_path_buf(),
            });
        }

        let mut opts = git2::RepositoryInitOptions::new();
        opts.initial_head("main");
        let repo = git2::Repository::init_opts(path, &opts)?;
        tracing::info!(path = %path.display(), "git repository initialized");
        Self::from_git2(repo)
    }

    fn from_git2(repo: git2::Repository) -> Result<Self, GitError> {
        let work_dir = repo.workdir().ok_or(GitError::BareRepo)?.to_path_buf();
        // Canonicalize so containment checks survive symlinked temp dirs.
        let work_dir = work_dir
            .canonicalize()
            .map_err(|e| GitError::AccessError {
                message: format!("cannot canonicalize worktree root: {}", e),
            })?;

        Ok(Self { repo, work_dir })
    }

    /// The canonicalized worktree root.
    pub fn root(&self) -> &Path {
        &self.work_dir
    }

    /// Direct access to the underlying git2 repository.
    ///
    /// Reserved for the sync engine's fetch/rebase/merge/push plumbing;
    /// everything else goes through the typed methods.
    pub(crate) fn raw(&self) -> &git2::Repository {
        &self.repo
    }

    /// Mutable access for operations git2 requires it for (stashing).
    pub(crate) fn raw_mut(&mut self) -> &mut git2::Repository {
        &mut self.repo
    }

    /// Resolve `path` against the repository, requiring containment.
    ///
    /// Returns the path relative to the worktree root.
    ///
    /// # Errors
    ///
    /// - [`GitError::PathOutsideRepo`] if `path` is not inside the repository
    pub(crate) fn relative_to_root(&self, path: &Path) -> Result<PathBuf, GitError> {
        let resolved = self.resolve(path);
        resolved
            .strip_prefix(&self.work_dir)
            .map(Path::to_path_buf)
            .map_err(|_| GitError::PathOutsideRepo {
                path: path.to_path_buf(),
            })
    }

    /// Canonicalize `path` where possible (existing files), falling back to
    /// the path as given. Keeps containment checks consistent with the
    /// canonicalized worktree root.
    pub(crate) fn resolve(&self, path: &Path) -> PathBuf {
        path.canonicalize().unwrap_or_else(|_| path.to_path_buf())
    }

    // =========================================================================
    // HEAD and refs
    // =========================================================================

    /// HEAD commit id, or `None` when HEAD is unborn.
    pub fn head_oid(&self) -> Result<Option<git2::Oid>, GitError> {
        match self.repo.head() {
            Ok(head) => Ok(Some(head.peel_to_commit()?.id())),
            Err(e) if e.code() == git2::ErrorCode::UnbornBranch => Ok(None),
            Err(e) if e.code() == git2::ErrorCode::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// The current branch name, if HEAD points at a branch.
    ///
    /// Unborn branches still report their name (the branch HEAD will create
    /// its first commit on); detached HEAD reports `None`.
    pub fn current_branch(&self) -> Result<Option<String>, GitError> {
        match self.repo.head() {
            Ok(head) => {
                if head.is_branch() {
                    Ok(head.shorthand().map(String::from))
                } else {
                    Ok(None)
                }
            }
            Err(e) if e.code() == git2::ErrorCode::UnbornBranch => {
                // Symbolic HEAD names the unborn branch.
                let reference = self.repo.find_reference("HEAD")?;
                Ok(reference
                    .symbolic_target()
                    .and_then(|t| t.strip_prefix("refs/heads/"))
                    .map(String::from))
            }
            Err(e) => Err(e.into()),
        }
    }

    /// List local branch names.
    pub fn branch_names(&self) -> Result<Vec<String>, GitError> {
        let branches = self.repo.branches(Some(git2::BranchType::Local))?;

        let mut names = Vec::new();
        for branch in branches {
            let (branch, _) = branch?;
            if let Some(name) = branch.name()? {
                names.push(name.to_string());
            }
        }

        Ok(names)
    }

    // =========================================================================
    // State detection
    // =========================================================================

    /// The current in-progress operation state.
    pub fn state(&self) -> GitState {
        match self.repo.state() {
            git2::RepositoryState::Clean => GitState::Clean,
            git2::RepositoryState::Rebase
            | git2::RepositoryState::RebaseInteractive
            | git2::RepositoryState::RebaseMerge => GitState::Rebase,
            git2::RepositoryState::Merge => GitState::Merge,
            git2::RepositoryState::CherryPick | git2::RepositoryState::CherryPickSequence => {
                GitState::CherryPick
            }
            git2::RepositoryState::Revert | git2::RepositoryState::RevertSequence => {
                GitState::Revert
            }
            git2::RepositoryState::Bisect => GitState::Bisect,
            git2::RepositoryState::ApplyMailbox | git2::RepositoryState::ApplyMailboxOrRebase => {
                GitState::ApplyMailbox
            }
        }
    }

    /// Check for unresolved conflicts in the index.
    pub fn has_conflicts(&self) -> Result<bool, GitError> {
        Ok(self.repo.index()?.has_conflicts())
    }

    // =========================================================================
    // Commits and resets
    // =========================================================================

    /// Commit the staged changes with the given message.
    ///
    /// With `amend` set, the previous HEAD commit is rewritten instead of
    /// a new one being appended.
    pub fn commit(&self, message: &str, amend: bool) -> Result<git2::Oid, GitError> {
        let mut index = self.repo.index()?;
        let tree_id = index.write_tree()?;
        let tree = self.repo.find_tree(tree_id)?;
        let sig = self.signature()?;

        let oid = if amend {
            let head = self
                .head_oid()?
                .ok_or(GitError::UnbornHead)
                .and_then(|oid| self.repo.find_commit(oid).map_err(GitError::from))?;
            head.amend(
                Some("HEAD"),
                Some(&sig),
                Some(&sig),
                None,
                Some(message),
                Some(&tree),
            )?
        } else {
            let parent = match self.head_oid()? {
                Some(oid) => Some(self.repo.find_commit(oid)?),
                None => None,
            };
            let parents: Vec<_> = parent.iter().collect();
            self.repo
                .commit(Some("HEAD"), &sig, &sig, message, &tree, &parents)?
        };

        tracing::debug!(message, "commit created");
        Ok(oid)
    }

    /// Hard reset the worktree and index to `oid` and clear any
    /// in-progress operation state (`MERGE_HEAD` and friends).
    pub fn reset_hard(&self, oid: git2::Oid) -> Result<(), GitError> {
        let target = self.repo.find_object(oid, None)?;
        self.repo.reset(&target, git2::ResetType::Hard, None)?;
        self.repo.cleanup_state()?;
        Ok(())
    }

    /// Commit signature from repository config, with a neutral fallback
    /// when no identity is configured.
    pub(crate) fn signature(&self) -> Result<git2::Signature<'static>, GitError> {
        match self.repo.signature() {
            Ok(sig) => Ok(sig),
            Err(_) => Ok(git2::Signature::now("bibsync", "bibsync@localhost")?),
        }
    }

    // =========================================================================
    // Remotes
    // =========================================================================

    /// URL of the named remote, or `None` if the remote doesn't exist.
    pub fn remote_url(&self, name: &str) -> Result<Option<String>, GitError> {
        match self.repo.find_remote(name) {
            Ok(remote) => Ok(remote.url().map(String::from)),
            Err(e) if e.code() == git2::ErrorCode::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// The default remote name, preferring `origin`.
    pub fn default_remote(&self) -> Result<Option<String>, GitError> {
        let remotes = self.repo.remotes()?;

        for name in remotes.iter().flatten() {
            if name == "origin" {
                return Ok(Some(name.to_string()));
            }
        }

        Ok(remotes.iter().flatten().next().map(String::from))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn init_then_open() {
        let temp = TempDir::new().unwrap();
        let repo = Repository::init(temp.path()).unwrap();
        assert_eq!(repo.root(), temp.path().canonicalize().unwrap());

        let reopened = Repository::open(temp.path()).unwrap();
        assert_eq!(reopened.root(), repo.root());
    }

    #[test]
    fn init_twice_fails() {
        let temp = TempDir::new().unwrap();
        Repository::init(temp.path()).unwrap();

        let result = Repository::init(temp.path());
        assert!(matches!(result, Err(GitError::AlreadyARepo { .. })));
    }

    #[test]
    fn open_non_repository_fails() {
        let temp = TempDir::new().unwrap();
        let result = Repository::open(temp.path());
        assert!(matches!(result, Err(GitError::NotARepo { .. })));
    }

    #[test]
    fn fresh_repository_has_unborn_head() {
        let temp = TempDir::new().unwrap();
        let repo = Repository::init(temp.path()).unwrap();

        assert_eq!(repo.head_oid().unwrap(), None);
        assert_eq!(repo.current_branch().unwrap(), Some("main".to_string()));
        assert_eq!(repo.state(), GitState::Clean);
    }

    #[test]
    fn commit_on_unborn_head_creates_root_commit() {
        let temp = TempDir::new().unwrap();
        let repo = Repository::init(temp.path()).unwrap();

        std::fs::write(temp.path().join("refs.bib"), "@article{a}").unwrap();
        repo.stage(&temp.path().join("refs.bib")).unwrap();
        let oid = repo.commit("first", false).unwrap();

        assert_eq!(repo.head_oid().unwrap(), Some(oid));
        assert_eq!(repo.branch_names().unwrap(), vec!["main".to_string()]);
    }

    #[test]
    fn amend_rewrites_head() {
        let temp = TempDir::new().unwrap();
        let repo = Repository::init(temp.path()).unwrap();

        std::fs::write(temp.path().join("refs.bib"), "@article{a}").unwrap();
        repo.stage(&temp.path().join("refs.bib")).unwrap();
        let first = repo.commit("first", false).unwrap();

        std::fs::write(temp.path().join("refs.bib"), "@article{a,title={t}}").unwrap();
        repo.stage(&temp.path().join("refs.bib")).unwrap();
        let amended = repo.commit("first, amended", true).unwrap();

        assert_ne!(first, amended);
        assert_eq!(repo.head_oid().unwrap(), Some(amended));
    }

    #[test]
    fn reset_hard_restores_previous_commit() {
        let temp = TempDir::new().unwrap();
        let repo = Repository::init(temp.path()).unwrap();

        std::fs::write(temp.path().join("refs.bib"), "v1").unwrap();
        repo.stage(&temp.path().join("refs.bib")).unwrap();
        let first = repo.commit("v1", false).unwrap();

        std::fs::write(temp.path().join("refs.bib"), "v2").unwrap();
        repo.stage(&temp.path().join("refs.bib")).unwrap();
        repo.commit("v2", false).unwrap();

        repo.reset_hard(first).unwrap();
        assert_eq!(repo.head_oid().unwrap(), Some(first));
        assert_eq!(
            std::fs::read_to_string(temp.path().join("refs.bib")).unwrap(),
            "v1"
        );
    }

    #[test]
    fn no_remotes_by_default() {
        let temp = TempDir::new().unwrap();
        let repo = Repository::init(temp.path()).unwrap();

        assert_eq!(repo.default_remote().unwrap(), None);
        assert_eq!(repo.remote_url("origin").unwrap(), None);
    }

    #[test]
    fn state_display() {
        assert_eq!(GitState::Clean.to_string(), "clean");
        assert_eq!(GitState::Rebase.to_string(), "rebase");
        assert!(!GitState::Clean.is_in_progress());
        assert!(GitState::Merge.is_in_progress());
    }
}
