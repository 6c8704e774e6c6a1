//! git::locator
//!
//! Repository discovery by walking parent directories.
//!
//! Discovery is deliberately hand-rolled rather than delegated to
//! `git2::Repository::discover`: the walk must stop at the filesystem root
//! and must only recognize a directory that itself contains the `.git`
//! metadata directory, so that the answer can double as "where is the
//! repository root" for containment checks.

use std::path::{Path, PathBuf};

/// Find the repository root containing `path`.
///
/// Starts at `path` and walks upward through parent directories, returning
/// the first directory that contains a `.git` metadata directory. Returns
/// `None` when the filesystem root is reached without finding one.
///
/// Pure: no side effects, no repository is opened.
///
/// # Example
///
/// ```no_run
/// use bibsync::git::find_repository_root;
/// use std::path::Path;
///
/// if let Some(root) = find_repository_root(Path::new("/work/library/refs.bib")) {
///     println!("repository at {}", root.display());
/// }
/// ```
pub fn find_repository_root(path: &Path) -> Option<PathBuf> {
    let mut current = Some(path);

    while let Some(dir) = current {
        if dir.join(".git").is_dir() {
            return Some(dir.to_path_buf());
        }
        current = dir.parent();
    }

    None
}

/// Check whether `path` lies inside a git repository.
pub fn is_repository(path: &Path) -> bool {
    find_repository_root(path).is_some()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn finds_root_at_path_itself() {
        let temp = TempDir::new().unwrap();
        std::fs::create_dir(temp.path().join(".git")).unwrap();

        let root = find_repository_root(temp.path());
        assert_eq!(root, Some(temp.path().to_path_buf()));
    }

    #[test]
    fn finds_root_from_nested_path() {
        let temp = TempDir::new().unwrap();
        std::fs::create_dir(temp.path().join(".git")).unwrap();
        let nested = temp.path().join("a/b/c");
        std::fs::create_dir_all(&nested).unwrap();

        let root = find_repository_root(&nested);
        assert_eq!(root, Some(temp.path().to_path_buf()));
    }

    #[test]
    fn none_outside_repository() {
        let temp = TempDir::new().unwrap();
        assert_eq!(find_repository_root(temp.path()), None);
        assert!(!is_repository(temp.path()));
    }

    #[test]
    fn git_file_is_not_a_root() {
        // A `.git` regular file (worktree pointer) does not count; the
        // metadata must be a directory.
        let temp = TempDir::new().unwrap();
        std::fs::write(temp.path().join(".git"), "gitdir: elsewhere").unwrap();

        assert_eq!(find_repository_root(temp.path()), None);
    }

    #[test]
    fn is_repository_from_subdirectory() {
        let temp = TempDir::new().unwrap();
        std::fs::create_dir(temp.path().join(".git")).unwrap();
        let sub = temp.path().join("papers");
        std::fs::create_dir(&sub).unwrap();

        assert!(is_repository(&sub));
    }
}
