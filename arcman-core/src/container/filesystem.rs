//! ``src/container/filesystem.rs``
//! ============================================================================
//! # `FileSystemContainer`: OS Pass-Through Namespace
//!
//! Thin, stateless adapter over OS primitives so the rest of the system
//! stays namespace-agnostic. Listing failures degrade to an empty listing
//! rather than erroring the caller.

use std::fs;
use std::path::Path;

use tracing::debug;
use walkdir::WalkDir;

use crate::container::namespace::Namespace;

#[derive(Debug, Default, Clone, Copy)]
pub struct FileSystemContainer;

impl FileSystemContainer {
    /// Names of the immediate entries of `path`; empty when the listing
    /// fails (permissions, vanished directory).
    #[must_use]
    pub fn list_children(&self, path: &Path) -> Vec<String> {
        match fs::read_dir(path) {
            Ok(read_dir) => read_dir
                .filter_map(Result::ok)
                .map(|entry| entry.file_name().to_string_lossy().into_owned())
                .collect(),
            Err(e) => {
                debug!(path = %path.display(), error = %e, "directory listing failed");
                Vec::new()
            }
        }
    }

    #[must_use]
    pub fn is_enterable(&self, path: &Path) -> bool {
        path.is_dir()
    }

    /// Identity comparison by inode where the OS provides one.
    #[must_use]
    pub fn same_file(&self, a: &Path, b: &Path) -> bool {
        #[cfg(unix)]
        {
            use std::os::unix::fs::MetadataExt;
            match (fs::metadata(a), fs::metadata(b)) {
                (Ok(ma), Ok(mb)) => ma.dev() == mb.dev() && ma.ino() == mb.ino(),
                _ => false,
            }
        }
        #[cfg(not(unix))]
        {
            a.to_string_lossy().to_lowercase() == b.to_string_lossy().to_lowercase()
        }
    }

    /// Recursive count of files and directories under `path`, stopping
    /// early once `limit` is reached. Unreadable entries are skipped, not
    /// counted.
    #[must_use]
    pub fn count_items(&self, path: &Path, limit: Option<usize>) -> usize {
        let mut n = 0usize;
        for entry in WalkDir::new(path).min_depth(1).into_iter() {
            if entry.is_err() {
                continue;
            }
            n += 1;
            if limit.is_some_and(|l| n >= l) {
                return n;
            }
        }
        n
    }
}

impl Namespace for FileSystemContainer {
    fn list_children(&self, path: &Path) -> Vec<String> {
        Self::list_children(self, path)
    }

    fn is_enterable(&self, path: &Path) -> bool {
        Self::is_enterable(self, path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::File;
    use std::io::Write;

    fn scratch_tree() -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir_all(dir.path().join("sub/inner")).unwrap();
        File::create(dir.path().join("a.txt"))
            .unwrap()
            .write_all(b"a")
            .unwrap();
        File::create(dir.path().join("sub/b.txt"))
            .unwrap()
            .write_all(b"b")
            .unwrap();
        dir
    }

    #[test]
    fn lists_children_by_name() {
        let dir = scratch_tree();
        let fs_container = FileSystemContainer;

        let mut names = fs_container.list_children(dir.path());
        names.sort();
        assert_eq!(names, vec!["a.txt", "sub"]);
    }

    #[test]
    fn missing_directory_lists_empty() {
        let fs_container = FileSystemContainer;
        assert!(
            fs_container
                .list_children(Path::new("/no/such/dir/anywhere"))
                .is_empty()
        );
    }

    #[test]
    fn enterable_only_for_directories() {
        let dir = scratch_tree();
        let fs_container = FileSystemContainer;

        assert!(fs_container.is_enterable(&dir.path().join("sub")));
        assert!(!fs_container.is_enterable(&dir.path().join("a.txt")));
    }

    #[test]
    fn same_file_by_identity() {
        let dir = scratch_tree();
        let fs_container = FileSystemContainer;
        let a = dir.path().join("a.txt");

        assert!(fs_container.same_file(&a, &a));
        assert!(!fs_container.same_file(&a, &dir.path().join("sub/b.txt")));
    }

    #[test]
    fn count_items_is_bounded() {
        let dir = scratch_tree();
        let fs_container = FileSystemContainer;

        // a.txt, sub, sub/inner, sub/b.txt
        assert_eq!(fs_container.count_items(dir.path(), None), 4);
        assert_eq!(fs_container.count_items(dir.path(), Some(2)), 2);
    }
}
