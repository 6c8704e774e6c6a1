//! git::staging
//!
//! Staging and unstaging with the new-directory workaround.
//!
//! Adding a file that lives inside a brand-new subdirectory does not
//! reliably register the directory with the staging primitive, so the add
//! is redirected to the enclosing untracked folder instead. The redirection
//! decision is a pure function ([`redirect_add_target`]) over the current
//! untracked-folder set; the batch forms apply it per element and
//! deduplicate the resulting targets before touching the index.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use super::repository::{GitError, Repository};

/// Decide what actually gets staged for `path`.
///
/// If `path` lies strictly inside one of `untracked_folders`, that folder
/// is the staging target; otherwise `path` itself is. Pure function: the
/// caller supplies the current untracked-folder set.
///
/// # Example
///
/// ```
/// use bibsync::git::redirect_add_target;
/// use std::collections::BTreeSet;
/// use std::path::{Path, PathBuf};
///
/// let folders: BTreeSet<PathBuf> = [PathBuf::from("/repo/new")].into();
/// assert_eq!(
///     redirect_add_target(Path::new("/repo/new/sub/refs.bib"), &folders),
///     Path::new("/repo/new"),
/// );
/// assert_eq!(
///     redirect_add_target(Path::new("/repo/refs.bib"), &folders),
///     Path::new("/repo/refs.bib"),
/// );
/// ```
pub fn redirect_add_target(path: &Path, untracked_folders: &BTreeSet<PathBuf>) -> PathBuf {
    for folder in untracked_folders {
        if path.starts_with(folder) && path != folder.as_path() {
            return folder.clone();
        }
    }
    path.to_path_buf()
}

impl Repository {
    /// Stage `path`, redirecting to its enclosing untracked folder when
    /// necessary. A directory target is added recursively.
    ///
    /// # Errors
    ///
    /// - [`GitError::PathOutsideRepo`] if `path` is not inside the repository
    pub fn stage(&self, path: &Path) -> Result<(), GitError> {
        let resolved = self.resolve(path);
        self.relative_to_root(&resolved)?;

        let target = redirect_add_target(&resolved, &self.untracked_folders()?);
        self.stage_exact(&target)
    }

    /// Stage several paths, applying the redirection per element in sorted
    /// order and staging each distinct target once.
    pub fn stage_all<I>(&self, paths: I) -> Result<(), GitError>
    where
        I: IntoIterator,
        I::Item: AsRef<Path>,
    {
        let folders = self.untracked_folders()?;

        let mut targets = BTreeSet::new();
        for path in paths {
            let resolved = self.resolve(path.as_ref());
            self.relative_to_root(&resolved)?;
            targets.insert(redirect_add_target(&resolved, &folders));
        }

        for target in targets {
            self.stage_exact(&target)?;
        }
        Ok(())
    }

    /// Stage exactly `target` with no redirection.
    fn stage_exact(&self, target: &Path) -> Result<(), GitError> {
        let rel = self.relative_to_root(target)?;

        let mut index = self.raw().index()?;
        if target.is_dir() {
            index.add_all([rel.as_path()], git2::IndexAddOption::DEFAULT, None)?;
        } else {
            index.add_path(&rel)?;
        }
        index.write()?;

        tracing::debug!(path = %target.display(), "staged");
        Ok(())
    }

    /// Remove `path` from the staging area.
    ///
    /// The index entry is reset to its HEAD state; with an unborn HEAD the
    /// entry is simply dropped from the index.
    ///
    /// # Errors
    ///
    /// - [`GitError::PathOutsideRepo`] if `path` is not inside the repository
    pub fn unstage(&self, path: &Path) -> Result<(), GitError> {
        let resolved = self.resolve(path);
        let rel = self.relative_to_root(&resolved)?;

        match self.head_oid()? {
            Some(oid) => {
                let head = self.raw().find_object(oid, None)?;
                self.raw().reset_default(Some(&head), [rel.as_path()])?;
            }
            None => {
                let mut index = self.raw().index()?;
                index.remove_path(&rel)?;
                index.write()?;
            }
        }

        tracing::debug!(path = %resolved.display(), "unstaged");
        Ok(())
    }

    /// Remove several paths from the staging area, in sorted order.
    pub fn unstage_all<I>(&self, paths: I) -> Result<(), GitError>
    where
        I: IntoIterator,
        I::Item: AsRef<Path>,
    {
        let sorted: BTreeSet<PathBuf> = paths
            .into_iter()
            .map(|p| self.resolve(p.as_ref()))
            .collect();

        for path in sorted {
            self.unstage(&path)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn folders(items: &[&str]) -> BTreeSet<PathBuf> {
        items.iter().map(PathBuf::from).collect()
    }

    #[test]
    fn no_redirection_outside_untracked_folders() {
        let f = folders(&["/repo/new"]);
        assert_eq!(
            redirect_add_target(Path::new("/repo/refs.bib"), &f),
            Path::new("/repo/refs.bib")
        );
    }

    #[test]
    fn redirects_to_enclosing_folder() {
        let f = folders(&["/repo/new"]);
        assert_eq!(
            redirect_add_target(Path::new("/repo/new/refs.bib"), &f),
            Path::new("/repo/new")
        );
        assert_eq!(
            redirect_add_target(Path::new("/repo/new/deep/refs.bib"), &f),
            Path::new("/repo/new")
        );
    }

    #[test]
    fn folder_itself_is_not_redirected() {
        let f = folders(&["/repo/new"]);
        assert_eq!(
            redirect_add_target(Path::new("/repo/new"), &f),
            Path::new("/repo/new")
        );
    }

    #[test]
    fn empty_folder_set_is_identity() {
        let f = BTreeSet::new();
        assert_eq!(
            redirect_add_target(Path::new("/repo/a/b"), &f),
            Path::new("/repo/a/b")
        );
    }

    proptest! {
        // The redirection target is always the path itself or one of the
        // supplied folders, and a redirected target is a proper ancestor.
        #[test]
        fn target_is_path_or_ancestor_folder(
            segs in proptest::collection::vec("[a-z]{1,6}", 1..5),
            folder_depth in 0usize..4,
        ) {
            let path: PathBuf = std::iter::once("/repo".to_string())
                .chain(segs.iter().cloned())
                .collect();
            let mut f = BTreeSet::new();
            if folder_depth > 0 && folder_depth < segs.len() {
                let folder: PathBuf = std::iter::once("/repo".to_string())
                    .chain(segs.iter().take(folder_depth).cloned())
                    .collect();
                f.insert(folder);
            }

            let target = redirect_add_target(&path, &f);
            prop_assert!(target == path || f.contains(&target));
            prop_assert!(path.starts_with(&target));
        }
    }
}
