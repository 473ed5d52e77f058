// wpa-aio/src/tree.rs
//! Lazy walk over an installation tree yielding regular-file leaves keyed by
//! their `/`-separated path relative to the root.

use std::collections::BTreeMap;
use std::path::{Component, Path, PathBuf};

use tracing::debug;
use walkdir::WalkDir;
use wpa_common::error::{Result, WpaError};

use crate::checksum::sha256_file;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TreeEntry {
    pub relative_path: String,
    pub absolute_path: PathBuf,
    pub is_file: bool,
    pub size: u64,
}

impl TreeEntry {
    /// Content fingerprint. Reads the file; callers fingerprint each entry at most once.
    pub fn fingerprint(&self) -> Result<String> {
        sha256_file(&self.absolute_path)
    }

    pub fn extension(&self) -> Option<&str> {
        Path::new(&self.relative_path)
            .extension()
            .and_then(|e| e.to_str())
    }
}

#[derive(Debug, Clone)]
pub struct DirectoryTree {
    root: PathBuf,
}

impl DirectoryTree {
    pub fn open(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        if !root.is_dir() {
            return Err(WpaError::tree_walk(&root, "not a directory"));
        }
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Restartable: every call starts a fresh walk.
    pub fn walk(&self) -> impl Iterator<Item = Result<TreeEntry>> + '_ {
        self.walk_from(self.root.clone())
    }

    /// Walks only `subdir` (relative to the root). A missing subdirectory yields nothing.
    pub fn walk_subtree(&self, subdir: &str) -> impl Iterator<Item = Result<TreeEntry>> + '_ {
        let start = self.root.join(subdir);
        let present = start.is_dir();
        self.walk_from(start).filter(move |_| present)
    }

    fn walk_from(&self, start: PathBuf) -> impl Iterator<Item = Result<TreeEntry>> + '_ {
        WalkDir::new(start)
            .follow_links(false)
            .sort_by_file_name()
            .into_iter()
            .filter_map(move |item| {
                let entry = match item {
                    Ok(entry) => entry,
                    Err(e) => {
                        let path = e
                            .path()
                            .map(Path::to_path_buf)
                            .unwrap_or_else(|| self.root.clone());
                        return Some(Err(WpaError::tree_walk(path, e.to_string())));
                    }
                };
                if entry.depth() == 0 && entry.file_type().is_dir() {
                    return None;
                }
                let relative_path = match relative_key(&self.root, entry.path()) {
                    Ok(Some(rel)) => rel,
                    Ok(None) => return None,
                    Err(e) => return Some(Err(e)),
                };
                let is_file = entry.file_type().is_file();
                let size = if is_file {
                    match entry.metadata() {
                        Ok(meta) => meta.len(),
                        Err(e) => {
                            return Some(Err(WpaError::tree_walk(entry.path(), e.to_string())))
                        }
                    }
                } else {
                    0
                };
                Some(Ok(TreeEntry {
                    relative_path,
                    absolute_path: entry.into_path(),
                    is_file,
                    size,
                }))
            })
    }

    /// Every regular file in the tree, keyed by relative path. Any walk error is fatal.
    pub fn files(&self) -> Result<BTreeMap<String, TreeEntry>> {
        let mut files = BTreeMap::new();
        for entry in self.walk() {
            let entry = entry?;
            if entry.is_file {
                files.insert(entry.relative_path.clone(), entry);
            }
        }
        debug!("Indexed {} files under {}", files.len(), self.root.display());
        Ok(files)
    }
}

/// `/`-joined path of `path` relative to `root`, or `None` for the root itself.
///
/// Names that are not valid UTF-8 fail with `TreeWalkError`: a lossy key could
/// collide with another file and hide it from the comparison.
pub fn relative_key(root: &Path, path: &Path) -> Result<Option<String>> {
    let Ok(rel) = path.strip_prefix(root) else {
        return Ok(None);
    };
    let mut parts = Vec::new();
    for component in rel.components() {
        if let Component::Normal(part) = component {
            let part = part
                .to_str()
                .ok_or_else(|| WpaError::tree_walk(path, "file name is not valid UTF-8"))?;
            parts.push(part);
        }
    }
    if parts.is_empty() {
        Ok(None)
    } else {
        Ok(Some(parts.join("/")))
    }
}

#[cfg(test)]
mod tests {
    use std::fs;

    use super::*;

    fn sample_tree() -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir_all(dir.path().join("wp-admin/css")).unwrap();
        fs::write(dir.path().join("wp-admin/css/about.css"), "body{}").unwrap();
        fs::write(dir.path().join("index.php"), "<?php").unwrap();
        fs::create_dir_all(dir.path().join("wp-content/uploads/2024")).unwrap();
        fs::write(dir.path().join("wp-content/uploads/2024/a.jpg"), "jpg").unwrap();
        dir
    }

    #[test]
    fn files_are_keyed_by_slash_separated_relative_path() {
        let dir = sample_tree();
        let tree = DirectoryTree::open(dir.path()).unwrap();
        let keys: Vec<String> = tree.files().unwrap().into_keys().collect();
        assert_eq!(
            keys,
            vec![
                "index.php".to_string(),
                "wp-admin/css/about.css".to_string(),
                "wp-content/uploads/2024/a.jpg".to_string(),
            ]
        );
    }

    #[test]
    fn directories_are_walked_but_not_files() {
        let dir = sample_tree();
        let tree = DirectoryTree::open(dir.path()).unwrap();
        let dirs: Vec<String> = tree
            .walk()
            .filter_map(|e| e.ok())
            .filter(|e| !e.is_file)
            .map(|e| e.relative_path)
            .collect();
        assert!(dirs.contains(&"wp-admin".to_string()));
        assert!(!dirs.iter().any(|d| d.is_empty()));
    }

    #[test]
    fn walk_is_restartable() {
        let dir = sample_tree();
        let tree = DirectoryTree::open(dir.path()).unwrap();
        let first: Vec<_> = tree.walk().filter_map(|e| e.ok()).collect();
        let second: Vec<_> = tree.walk().filter_map(|e| e.ok()).collect();
        assert_eq!(first, second);
    }

    #[test]
    fn subtree_walk_keeps_root_relative_paths() {
        let dir = sample_tree();
        let tree = DirectoryTree::open(dir.path()).unwrap();
        let files: Vec<String> = tree
            .walk_subtree("wp-content/uploads")
            .filter_map(|e| e.ok())
            .filter(|e| e.is_file)
            .map(|e| e.relative_path)
            .collect();
        assert_eq!(files, vec!["wp-content/uploads/2024/a.jpg".to_string()]);
        assert_eq!(tree.walk_subtree("wp-content/cache").count(), 0);
    }

    #[cfg(unix)]
    #[test]
    fn symlinks_are_not_files() {
        let dir = sample_tree();
        std::os::unix::fs::symlink(dir.path().join("index.php"), dir.path().join("link.php"))
            .unwrap();
        let tree = DirectoryTree::open(dir.path()).unwrap();
        assert!(!tree.files().unwrap().contains_key("link.php"));
    }

    #[cfg(unix)]
    #[test]
    fn non_utf8_names_fail_the_walk() {
        use std::ffi::OsStr;
        use std::os::unix::ffi::OsStrExt;

        let dir = sample_tree();
        let first = dir.path().join(OsStr::from_bytes(b"shell\xff.php"));
        let second = dir.path().join(OsStr::from_bytes(b"shell\xfe.php"));
        // Some filesystems refuse such names outright; nothing to check there.
        if fs::write(&first, "<?php").is_err() || fs::write(&second, "<?php").is_err() {
            return;
        }
        let tree = DirectoryTree::open(dir.path()).unwrap();
        match tree.files().unwrap_err() {
            WpaError::TreeWalkError { path, message } => {
                assert!(path == first || path == second);
                assert!(message.contains("UTF-8"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn relative_keys_use_forward_slashes() {
        let root = Path::new("/srv/www");
        assert_eq!(
            relative_key(root, Path::new("/srv/www/wp-admin/index.php")).unwrap(),
            Some("wp-admin/index.php".to_string())
        );
        assert_eq!(relative_key(root, root).unwrap(), None);
    }

    #[test]
    fn opening_a_file_fails() {
        let dir = sample_tree();
        let err = DirectoryTree::open(dir.path().join("index.php")).unwrap_err();
        assert!(matches!(err, WpaError::TreeWalkError { .. }));
    }
}
