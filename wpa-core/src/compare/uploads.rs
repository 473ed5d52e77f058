// wpa-core/src/compare/uploads.rs
use std::collections::BTreeSet;

use tracing::{debug, instrument};
use wpa_aio::DirectoryTree;
use wpa_common::error::Result;

/// Flags files under the upload area whose extension the web server would execute.
#[derive(Debug, Clone)]
pub struct UploadScanner {
    subdir: String,
    extensions: BTreeSet<String>,
}

impl UploadScanner {
    pub fn new<I, S>(subdir: impl Into<String>, extensions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            subdir: subdir.into().trim_matches('/').to_string(),
            extensions: extensions
                .into_iter()
                .map(|e| e.as_ref().trim_start_matches('.').to_ascii_lowercase())
                .collect(),
        }
    }

    /// Paths relative to the live root, sorted. A missing upload area yields none.
    #[instrument(skip_all, fields(subdir = %self.subdir))]
    pub fn scan(&self, live: &DirectoryTree) -> Result<Vec<String>> {
        let mut flagged = Vec::new();
        for entry in live.walk_subtree(&self.subdir) {
            let entry = entry?;
            if !entry.is_file {
                continue;
            }
            let executable = entry
                .extension()
                .is_some_and(|ext| self.extensions.contains(&ext.to_ascii_lowercase()));
            if executable {
                flagged.push(entry.relative_path);
            }
        }
        flagged.sort();
        debug!("{} executable file(s) in {}", flagged.len(), self.subdir);
        Ok(flagged)
    }
}
