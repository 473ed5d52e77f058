// wpa-aio/src/fs.rs
// Primitive synchronous filesystem operations used around the scratch directory.
use std::fs;
use std::io;
use std::path::Path;

use tracing::{debug, error};
use wpa_common::error::{Result, WpaError};

/// Creates a directory and all its parent components if they are missing.
pub fn create_dir_all(path: &Path) -> Result<()> {
    debug!("Creating directory recursively: {}", path.display());
    fs::create_dir_all(path).map_err(|e| {
        error!("Failed create dir {}: {}", path.display(), e);
        WpaError::from(e)
    })
}

/// Removes a directory and all its contents. A missing directory is not an error.
pub fn remove_dir_all_if_exists(path: &Path) -> Result<bool> {
    match fs::symlink_metadata(path) {
        Ok(meta) if meta.is_dir() => {
            debug!("Removing directory recursively: {}", path.display());
            fs::remove_dir_all(path).map_err(|e| {
                error!("Failed remove dir {}: {}", path.display(), e);
                WpaError::from(e)
            })?;
            Ok(true)
        }
        Ok(_) => {
            fs::remove_file(path)?;
            Ok(true)
        }
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
        Err(e) => Err(WpaError::from(e)),
    }
}

/// True when `path` does not exist or is an empty directory. Entries named in
/// `ignored` (e.g. a stale lock file) do not count.
pub fn is_dir_effectively_empty(path: &Path, ignored: &[&str]) -> Result<bool> {
    let entries = match fs::read_dir(path) {
        Ok(entries) => entries,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(true),
        Err(e) => return Err(WpaError::from(e)),
    };
    for entry in entries {
        let entry = entry?;
        let name = entry.file_name();
        if !ignored.iter().any(|i| name == *i) {
            return Ok(false);
        }
    }
    Ok(true)
}

/// Names of the immediate subdirectories of `path`, sorted. Missing `path` yields none.
pub fn list_subdirectories(path: &Path) -> Result<Vec<String>> {
    let entries = match fs::read_dir(path) {
        Ok(entries) => entries,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(WpaError::from(e)),
    };
    let mut names = Vec::new();
    for entry in entries {
        let entry = entry?;
        if entry.file_type()?.is_dir() {
            names.push(entry.file_name().to_string_lossy().to_string());
        }
    }
    names.sort();
    Ok(names)
}
