// wpa-aio/src/extract.rs
// Unpacks downloaded zip archives into the reference tree.

use std::fs::{self, File};
use std::io::BufReader;
use std::path::{Component, Path, PathBuf};

use tracing::{debug, error, warn};
use wpa_common::error::{Result, WpaError};
use wpa_common::ports::{ArchiveExtractor, ExtractLayout, ExtractSummary};
use zip::ZipArchive;

#[derive(Debug, Default, Clone, Copy)]
pub struct ZipExtractor;

impl ArchiveExtractor for ZipExtractor {
    fn extract(
        &self,
        archive: &Path,
        dest: &Path,
        layout: &ExtractLayout,
    ) -> Result<ExtractSummary> {
        extract_zip(archive, dest, layout)
    }
}

/// Extracts `archive_path` below `target_dir`, stripping leading components and
/// re-rooting under `layout.prefix`. Unsafe entry paths abort the extraction.
pub fn extract_zip(
    archive_path: &Path,
    target_dir: &Path,
    layout: &ExtractLayout,
) -> Result<ExtractSummary> {
    debug!(
        "Extracting '{}' to '{}' (strip_components={}, prefix={:?})",
        archive_path.display(),
        target_dir.display(),
        layout.strip_components,
        layout.prefix
    );
    let corrupt = |msg: String| WpaError::CorruptArchive(format!("{}: {msg}", archive_path.display()));

    let file = File::open(archive_path)?;
    let mut archive = ZipArchive::new(BufReader::new(file))
        .map_err(|e| corrupt(format!("Failed to open ZIP: {e}")))?;

    let base = match &layout.prefix {
        Some(prefix) => {
            ensure_relative(prefix).map_err(|m| corrupt(m))?;
            target_dir.join(prefix)
        }
        None => target_dir.to_path_buf(),
    };
    fs::create_dir_all(&base)?;

    let mut summary = ExtractSummary::default();
    for i in 0..archive.len() {
        let mut entry = archive
            .by_index(i)
            .map_err(|e| corrupt(format!("Failed to access ZIP entry {i}: {e}")))?;
        let raw_name = entry.name().to_string();

        let out_path = match entry_target(&base, &raw_name, layout.strip_components) {
            Ok(Some(path)) => path,
            Ok(None) => continue,
            Err(msg) => {
                error!("{} in {}", msg, archive_path.display());
                return Err(corrupt(msg));
            }
        };

        if entry.is_symlink() {
            warn!("Skipping symlink entry '{}' in {}", raw_name, archive_path.display());
            continue;
        }

        if entry.is_dir() {
            fs::create_dir_all(&out_path)?;
            continue;
        }

        if let Some(parent) = out_path.parent() {
            fs::create_dir_all(parent)?;
        }
        if out_path.symlink_metadata().is_ok() {
            warn!(
                "Extraction collision: '{}' already exists, overwriting with entry from {}",
                out_path.display(),
                archive_path.display()
            );
            summary.overwritten.push(out_path.clone());
        }
        let mut outfile = File::create(&out_path)?;
        std::io::copy(&mut entry, &mut outfile)
            .map_err(|e| corrupt(format!("Failed to write '{raw_name}': {e}")))?;
        summary.files_written += 1;
    }

    debug!(
        "Extracted {} files from {}",
        summary.files_written,
        archive_path.display()
    );
    Ok(summary)
}

/// Maps an entry name to its output path. `Ok(None)` means the entry vanishes
/// after stripping (e.g. the top-level directory itself).
fn entry_target(
    base: &Path,
    raw_name: &str,
    strip_components: usize,
) -> std::result::Result<Option<PathBuf>, String> {
    let original = Path::new(raw_name);
    let mut kept = Vec::new();
    for (index, comp) in original.components().enumerate() {
        match comp {
            Component::Normal(part) => {
                if index >= strip_components {
                    kept.push(part);
                }
            }
            Component::CurDir => {}
            other => {
                return Err(format!(
                    "Unsafe path component {other:?} in ZIP entry '{raw_name}'"
                ))
            }
        }
    }
    if raw_name.contains('\\') {
        return Err(format!("Backslash in ZIP entry '{raw_name}'"));
    }
    if kept.is_empty() {
        return Ok(None);
    }
    let mut target = base.to_path_buf();
    for part in kept {
        target.push(part);
    }
    if !target.starts_with(base) {
        return Err(format!("Path traversal detected for ZIP entry '{raw_name}'"));
    }
    Ok(Some(target))
}

fn ensure_relative(prefix: &Path) -> std::result::Result<(), String> {
    if prefix
        .components()
        .all(|c| matches!(c, Component::Normal(_) | Component::CurDir))
    {
        Ok(())
    } else {
        Err(format!("Unsafe extraction prefix {}", prefix.display()))
    }
}
