// wpa-core/src/check/detect.rs
use std::path::Path;

use tracing::debug;
use wpa_common::config::WP_COMMON_FILES;
use wpa_common::error::{Result, WpaError};

/// True if every file in `WP_COMMON_FILES` exists under `dir`.
pub fn is_wordpress(dir: &Path) -> bool {
    WP_COMMON_FILES.iter().all(|rel| {
        let present = dir.join(rel).is_file();
        if !present {
            debug!("{} lacks {}", dir.display(), rel);
        }
        present
    })
}

pub fn ensure_wordpress(dir: &Path) -> Result<()> {
    if is_wordpress(dir) {
        Ok(())
    } else {
        Err(WpaError::NotWordPress(dir.to_path_buf()))
    }
}
