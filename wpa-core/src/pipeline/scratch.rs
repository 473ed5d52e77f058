// wpa-core/src/pipeline/scratch.rs
//! Exclusive ownership of the scratch directory for the duration of a build.

use std::fs::{self, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use tracing::{debug, warn};
use wpa_aio::fs::{create_dir_all, is_dir_effectively_empty, remove_dir_all_if_exists};
use wpa_common::config::Config;
use wpa_common::error::{Result, WpaError};

/// Holds `<scratch>/.wpa.lock`; the file is removed when the guard drops.
#[derive(Debug)]
pub struct ScratchLock {
    scratch: PathBuf,
    lock_path: PathBuf,
}

impl ScratchLock {
    /// Prepares `downloads/` and an empty `reference/` under the scratch dir.
    ///
    /// Fails with `ScratchDirConflict` when the directory is a file, is not
    /// empty and reuse was not requested, or is locked by another run.
    pub fn acquire(config: &Config) -> Result<Self> {
        let scratch = config.scratch_dir().to_path_buf();
        let conflict = |why: &str| WpaError::ScratchDirConflict(scratch.clone(), why.to_string());

        if scratch.exists() && !scratch.is_dir() {
            return Err(conflict("exists and is not a directory"));
        }
        if !config.reuse_scratch
            && !is_dir_effectively_empty(&scratch, &[Config::lock_filename()])?
        {
            return Err(conflict(
                "directory is not empty (pass --reuse-scratch to build over it)",
            ));
        }
        create_dir_all(&scratch)?;

        let lock_path = config.lock_path();
        let mut file = match OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&lock_path)
        {
            Ok(file) => file,
            Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                return Err(conflict(&format!(
                    "locked by another run; remove {} if it is stale",
                    lock_path.display()
                )))
            }
            Err(e) => return Err(e.into()),
        };
        writeln!(file, "{}", std::process::id())?;
        let lock = Self { scratch, lock_path };
        debug!("Acquired scratch lock {}", lock.lock_path.display());

        if config.reuse_scratch && remove_dir_all_if_exists(&config.reference_dir())? {
            debug!("Cleared previous reference tree");
        }
        create_dir_all(&config.downloads_dir())?;
        create_dir_all(&config.reference_dir())?;
        Ok(lock)
    }

    pub fn scratch_dir(&self) -> &Path {
        &self.scratch
    }
}

impl Drop for ScratchLock {
    fn drop(&mut self) {
        if let Err(e) = fs::remove_file(&self.lock_path) {
            if e.kind() != ErrorKind::NotFound {
                warn!(
                    "Failed to remove scratch lock {}: {}",
                    self.lock_path.display(),
                    e
                );
            }
        }
    }
}

/// Deletes the whole scratch directory unless a run currently holds it.
pub fn teardown_scratch(config: &Config) -> Result<bool> {
    let lock_path = config.lock_path();
    if lock_path.exists() {
        return Err(WpaError::ScratchDirConflict(
            config.scratch_dir().to_path_buf(),
            format!("locked by another run; remove {} if it is stale", lock_path.display()),
        ));
    }
    let removed = remove_dir_all_if_exists(config.scratch_dir())?;
    debug!(
        "Teardown of {}: removed={}",
        config.scratch_dir().display(),
        removed
    );
    Ok(removed)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config_at(path: &Path, reuse: bool) -> Config {
        Config {
            scratch_dir: path.to_path_buf(),
            reuse_scratch: reuse,
            ..Config::default()
        }
    }

    #[test]
    fn fresh_directory_is_laid_out_and_unlocked_on_drop() {
        let dir = tempfile::tempdir().unwrap();
        let config = config_at(&dir.path().join("scratch"), false);
        {
            let lock = ScratchLock::acquire(&config).unwrap();
            assert_eq!(lock.scratch_dir(), config.scratch_dir());
            assert!(config.lock_path().is_file());
            assert!(config.downloads_dir().is_dir());
            assert!(config.reference_dir().is_dir());
        }
        assert!(!config.lock_path().exists());
    }

    #[test]
    fn non_empty_directory_conflicts_without_reuse() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("notes.txt"), "keep me").unwrap();
        let err = ScratchLock::acquire(&config_at(dir.path(), false)).unwrap_err();
        assert!(matches!(err, WpaError::ScratchDirConflict(..)));
        assert!(dir.path().join("notes.txt").is_file());
    }

    #[test]
    fn second_lock_is_refused() {
        let dir = tempfile::tempdir().unwrap();
        let config = config_at(dir.path(), true);
        let _held = ScratchLock::acquire(&config).unwrap();
        let err = ScratchLock::acquire(&config).unwrap_err();
        assert!(matches!(err, WpaError::ScratchDirConflict(..)));
        assert!(matches!(teardown_scratch(&config), Err(WpaError::ScratchDirConflict(..))));
    }

    #[test]
    fn reuse_clears_reference_but_keeps_downloads() {
        let dir = tempfile::tempdir().unwrap();
        let config = config_at(dir.path(), true);
        fs::create_dir_all(config.reference_dir().join("wp-admin")).unwrap();
        fs::write(config.reference_dir().join("wp-admin/stale.php"), "x").unwrap();
        fs::create_dir_all(config.downloads_dir()).unwrap();
        fs::write(config.downloads_dir().join("wordpress-6.5.zip"), "zip").unwrap();

        let _lock = ScratchLock::acquire(&config).unwrap();
        assert!(!config.reference_dir().join("wp-admin").exists());
        assert!(config.downloads_dir().join("wordpress-6.5.zip").is_file());
    }

    #[test]
    fn teardown_removes_everything() {
        let dir = tempfile::tempdir().unwrap();
        let config = config_at(&dir.path().join("scratch"), false);
        drop(ScratchLock::acquire(&config).unwrap());
        assert!(teardown_scratch(&config).unwrap());
        assert!(!config.scratch_dir().exists());
        assert!(!teardown_scratch(&config).unwrap());
    }
}
