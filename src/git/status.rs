//! git::status
//!
//! File classification queries.
//!
//! Classification is recomputed from live repository state on every call
//! and is never cached across mutating operations. None of the queries
//! here mutate the repository.
//!
//! # Classification
//!
//! - **Untracked files**: newly created files plus tracked files with
//!   unstaged modifications. These are the files `synchronize` considers
//!   "changed".
//! - **Tracked files**: files whose change is staged (index-new or
//!   index-modified) and will land in the next commit.
//! - **Untracked folders**: directories with no tracked content, collapsed
//!   so that nested untracked folders report only their top-most ancestor.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use super::repository::{GitError, Repository};

/// Snapshot of file classification, produced by [`Repository::classify`].
///
/// Ephemeral: produced and consumed within a single orchestration step.
/// All paths are absolute.
#[derive(Debug, Clone, Default)]
pub struct FileClassification {
    /// New or modified-but-unstaged files.
    pub untracked: BTreeSet<PathBuf>,
    /// Staged (index-new or index-modified) files.
    pub tracked: BTreeSet<PathBuf>,
    /// Untracked directories, collapsed to top-level ancestors.
    pub untracked_folders: BTreeSet<PathBuf>,
}

impl Repository {
    /// Classify the whole worktree in one pass over `git status`.
    pub fn classify(&self) -> Result<FileClassification, GitError> {
        let mut opts = git2::StatusOptions::new();
        opts.include_untracked(true)
            .recurse_untracked_dirs(true)
            .include_ignored(false);

        let statuses = self.raw().statuses(Some(&mut opts))?;

        let mut classification = FileClassification::default();
        for entry in statuses.iter() {
            let status = entry.status();
            let Some(rel) = entry.path() else {
                continue; // non-UTF8 path
            };
            let absolute = self.root().join(rel);

            if status.is_wt_new() || status.is_wt_modified() {
                classification.untracked.insert(absolute.clone());
            }
            if status.is_index_new() || status.is_index_modified() {
                classification.tracked.insert(absolute);
            }
        }

        classification.untracked_folders = self.untracked_folders()?;
        Ok(classification)
    }

    /// New or modified-but-unstaged files, as absolute paths.
    pub fn untracked_files(&self) -> Result<BTreeSet<PathBuf>, GitError> {
        Ok(self.classify()?.untracked)
    }

    /// Staged files (index-new or index-modified), as absolute paths.
    pub fn tracked_files(&self) -> Result<BTreeSet<PathBuf>, GitError> {
        Ok(self.classify()?.tracked)
    }

    /// Untracked directories, collapsed to their top-most untracked
    /// ancestor: if `a/` and `a/b/` are both untracked, only `a/` is
    /// reported.
    ///
    /// Note that git does not see empty directories; an untracked folder
    /// is only reported once it contains at least one file.
    pub fn untracked_folders(&self) -> Result<BTreeSet<PathBuf>, GitError> {
        // Without recursion, libgit2 reports an untracked directory as a
        // single worktree-new entry with a trailing slash.
        let mut opts = git2::StatusOptions::new();
        opts.include_untracked(true)
            .recurse_untracked_dirs(false)
            .include_ignored(false);

        let statuses = self.raw().statuses(Some(&mut opts))?;

        let mut folders = BTreeSet::new();
        for entry in statuses.iter() {
            if !entry.status().is_wt_new() {
                continue;
            }
            let Some(rel) = entry.path() else {
                continue;
            };
            let is_dir = rel.ends_with('/') || self.root().join(rel).is_dir();
            if is_dir {
                folders.insert(self.root().join(rel.trim_end_matches('/')));
            }
        }

        Ok(collapse_to_top_level(folders))
    }

    /// Check whether any files are untracked.
    pub fn has_untracked_files(&self) -> Result<bool, GitError> {
        Ok(!self.untracked_files()?.is_empty())
    }

    /// Check whether any files are staged.
    pub fn has_tracked_files(&self) -> Result<bool, GitError> {
        Ok(!self.tracked_files()?.is_empty())
    }

    /// Check whether any untracked folders exist.
    pub fn has_untracked_folders(&self) -> Result<bool, GitError> {
        Ok(!self.untracked_folders()?.is_empty())
    }
}

/// Drop every folder that has another reported folder as ancestor.
fn collapse_to_top_level(folders: BTreeSet<PathBuf>) -> BTreeSet<PathBuf> {
    folders
        .iter()
        .filter(|folder| {
            !folders
                .iter()
                .any(|other| *folder != other && folder.starts_with(other))
        })
        .cloned()
        .collect()
}
