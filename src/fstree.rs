//! In-memory file tree used to stage a vendor materialisation before it
//! touches disk. Paths are relative, `BTreeMap`-ordered so every walk over
//! the tree is lexicographic and reproducible.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Component, Path, PathBuf};

use crate::error::{Error, Result};

/// Default mode for emitted files.
pub const FILE_MODE: u32 = 0o644;
/// Default mode for created directories.
pub const DIR_MODE: u32 = 0o755;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileEntry {
    pub content: Vec<u8>,
}

/// A staged tree of relative paths to file contents.
#[derive(Debug, Clone, Default)]
pub struct FileTree {
    files: BTreeMap<PathBuf, FileEntry>,
}

impl FileTree {
    pub fn new() -> Self {
        FileTree::default()
    }

    /// Load a directory from disk, skipping VCS bookkeeping directories.
    pub fn load_dir(dir: &Path) -> Result<Self> {
        let mut tree = FileTree::new();
        tree.load_into(dir, dir)?;
        Ok(tree)
    }

    fn load_into(&mut self, dir: &Path, base: &Path) -> Result<()> {
        let mut entries: Vec<_> = fs::read_dir(dir)
            .map_err(|e| Error::fs(dir, e))?
            .collect::<std::io::Result<_>>()
            .map_err(|e| Error::fs(dir, e))?;
        entries.sort_by_key(|e| e.file_name());

        for entry in entries {
            let path = entry.path();
            let name = entry.file_name();
            if path.is_dir() {
                if matches!(name.to_str(), Some(".git" | ".hg" | ".bzr" | ".svn")) {
                    continue;
                }
                self.load_into(&path, base)?;
            } else if path.is_file() {
                let rel = path
                    .strip_prefix(base)
                    .map_err(|e| Error::fs(&path, e))?
                    .to_path_buf();
                let content = fs::read(&path).map_err(|e| Error::fs(&path, e))?;
                self.files.insert(rel, FileEntry { content });
            }
        }
        Ok(())
    }

    pub fn insert(&mut self, path: impl Into<PathBuf>, content: Vec<u8>) {
        self.files.insert(path.into(), FileEntry { content });
    }

    pub fn get(&self, path: impl AsRef<Path>) -> Option<&FileEntry> {
        self.files.get(path.as_ref())
    }

    pub fn contains(&self, path: impl AsRef<Path>) -> bool {
        self.files.contains_key(path.as_ref())
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    /// Lexicographically ordered iteration.
    pub fn iter(&self) -> impl Iterator<Item = (&PathBuf, &FileEntry)> {
        self.files.iter()
    }

    /// Keep only files under one of `prefixes`; everything else is pruned.
    pub fn retain_under(&mut self, prefixes: &[&str]) {
        self.files
            .retain(|path, _| prefixes.iter().any(|p| path.starts_with(p)));
    }

    /// Remove every subtree rooted at a directory with the given name, at
    /// any depth.
    pub fn remove_dirs_named(&mut self, name: &str) -> usize {
        let before = self.files.len();
        self.files.retain(|path, _| {
            !path
                .components()
                .any(|c| matches!(c, Component::Normal(n) if n == name))
        });
        before - self.files.len()
    }

    /// Re-root every file under `prefix`, merging into `other`.
    pub fn merge_into(self, other: &mut FileTree, prefix: &Path) {
        for (path, entry) in self.files {
            other.files.insert(prefix.join(path), entry);
        }
    }

    /// Write the tree to disk under `dir`. Directories are created 0755,
    /// files 0644.
    pub fn write_to(&self, dir: &Path) -> Result<()> {
        for (rel, entry) in &self.files {
            let full = dir.join(rel);
            if let Some(parent) = full.parent() {
                fs::create_dir_all(parent).map_err(|e| Error::fs(parent, e))?;
            }
            fs::write(&full, &entry.content).map_err(|e| Error::fs(&full, e))?;

            #[cfg(unix)]
            {
                use std::os::unix::fs::PermissionsExt;
                fs::set_permissions(&full, fs::Permissions::from_mode(FILE_MODE))
                    .map_err(|e| Error::fs(&full, e))?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn tree_with(paths: &[&str]) -> FileTree {
        let mut tree = FileTree::new();
        for path in paths {
            tree.insert(*path, format!("content of {}", path).into_bytes());
        }
        tree
    }

    #[test]
    fn test_load_dir_skips_vcs_dirs() {
        let dir = TempDir::new().unwrap();
        fs::create_dir_all(dir.path().join(".git")).unwrap();
        fs::create_dir_all(dir.path().join("sub")).unwrap();
        fs::write(dir.path().join(".git/config"), "x").unwrap();
        fs::write(dir.path().join("a.yaml"), "a").unwrap();
        fs::write(dir.path().join("sub/b.yaml"), "b").unwrap();

        let tree = FileTree::load_dir(dir.path()).unwrap();
        assert_eq!(tree.len(), 2);
        assert!(tree.contains("a.yaml"));
        assert!(tree.contains("sub/b.yaml"));
        assert!(!tree.contains(".git/config"));
    }

    #[test]
    fn test_retain_under() {
        let mut tree = tree_with(&["charts/x/a.yaml", "charts/y/b.yaml", "README.md"]);
        tree.retain_under(&["charts/x"]);
        assert_eq!(tree.len(), 1);
        assert!(tree.contains("charts/x/a.yaml"));
    }

    #[test]
    fn test_remove_dirs_named_strips_at_any_depth() {
        let mut tree = tree_with(&[
            "a.yaml",
            "_vendor/github.com/example/d/x.yaml",
            "deep/_vendor/y.yaml",
            "deep/keep.yaml",
        ]);
        let removed = tree.remove_dirs_named("_vendor");
        assert_eq!(removed, 2);
        assert_eq!(tree.len(), 2);
        assert!(tree.contains("a.yaml"));
        assert!(tree.contains("deep/keep.yaml"));
    }

    #[test]
    fn test_remove_dirs_named_absent_is_noop() {
        let mut tree = tree_with(&["a.yaml"]);
        assert_eq!(tree.remove_dirs_named("_vendor"), 0);
        assert_eq!(tree.len(), 1);
    }

    #[test]
    fn test_merge_into_prefixes_paths() {
        let sub = tree_with(&["x.yaml"]);
        let mut root = FileTree::new();
        sub.merge_into(&mut root, Path::new("github.com/example/a"));
        assert!(root.contains("github.com/example/a/x.yaml"));
    }

    #[test]
    fn test_write_to_sets_modes() {
        let dir = TempDir::new().unwrap();
        let tree = tree_with(&["sub/a.yaml"]);
        tree.write_to(dir.path()).unwrap();

        let full = dir.path().join("sub/a.yaml");
        assert!(full.exists());

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let mode = fs::metadata(&full).unwrap().permissions().mode() & 0o777;
            assert_eq!(mode, FILE_MODE);
        }
    }

    #[test]
    fn test_iteration_is_lexicographic() {
        let tree = tree_with(&["b.yaml", "a.yaml", "a/z.yaml"]);
        let paths: Vec<String> = tree
            .iter()
            .map(|(p, _)| p.display().to_string())
            .collect();
        let mut sorted = paths.clone();
        sorted.sort();
        assert_eq!(paths, sorted);
    }
}
