// wpa-core/src/compare/tree.rs
use std::cmp::Ordering;

use tracing::{debug, instrument};
use wpa_aio::{DirectoryTree, TreeEntry};
use wpa_common::error::Result;
use wpa_common::model::TreeDiff;

/// Classifies every regular file of two trees into DIFF, EXTRA or MISSING.
#[derive(Debug, Clone, Default)]
pub struct TreeComparator {
    ignore_prefixes: Vec<String>,
}

impl TreeComparator {
    pub fn new<I, S>(ignore_prefixes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let ignore_prefixes = ignore_prefixes
            .into_iter()
            .map(|p| p.as_ref().trim_matches('/').to_string())
            .filter(|p| !p.is_empty())
            .collect();
        Self { ignore_prefixes }
    }

    /// Prefixes match whole path components: `wp-content/uploads` covers
    /// `wp-content/uploads/x.jpg` but not `wp-content/uploads-old/x.jpg`.
    pub fn is_ignored(&self, path: &str) -> bool {
        self.ignore_prefixes.iter().any(|prefix| {
            path.strip_prefix(prefix.as_str())
                .is_some_and(|rest| rest.is_empty() || rest.starts_with('/'))
        })
    }

    #[instrument(skip_all, fields(live = %live.root().display(), reference = %reference.root().display()))]
    pub fn compare(&self, live: &DirectoryTree, reference: &DirectoryTree) -> Result<TreeDiff> {
        let live_files = live.files()?;
        let reference_files = reference.files()?;

        let mut diff = TreeDiff::default();
        let mut live_iter = live_files.iter().filter(|(p, _)| !self.is_ignored(p)).peekable();
        let mut ref_iter = reference_files
            .iter()
            .filter(|(p, _)| !self.is_ignored(p))
            .peekable();

        // Both maps iterate in path order, so one merge pass yields sorted output.
        loop {
            let order = match (live_iter.peek(), ref_iter.peek()) {
                (None, None) => break,
                (Some(_), None) => Ordering::Less,
                (None, Some(_)) => Ordering::Greater,
                (Some((l, _)), Some((r, _))) => l.cmp(r),
            };
            match order {
                Ordering::Less => {
                    if let Some((path, _)) = live_iter.next() {
                        diff.extra.push(path.clone());
                    }
                }
                Ordering::Greater => {
                    if let Some((path, _)) = ref_iter.next() {
                        diff.missing.push(path.clone());
                    }
                }
                Ordering::Equal => {
                    if let (Some((path, l)), Some((_, r))) = (live_iter.next(), ref_iter.next()) {
                        if !same_content(l, r)? {
                            diff.diff.push(path.clone());
                        }
                    }
                }
            }
        }

        debug!(
            "Compared {} live / {} reference files: {} diff, {} extra, {} missing",
            live_files.len(),
            reference_files.len(),
            diff.diff.len(),
            diff.extra.len(),
            diff.missing.len()
        );
        Ok(diff)
    }
}

fn same_content(live: &TreeEntry, reference: &TreeEntry) -> Result<bool> {
    if live.size != reference.size {
        return Ok(false);
    }
    Ok(live.fingerprint()? == reference.fingerprint()?)
}
