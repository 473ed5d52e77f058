// wpa-aio/src/checksum.rs
use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use sha2::{Digest, Sha256};
use tracing::trace;
use wpa_common::error::{Result, WpaError};

/// SHA-256 of a file's contents, hex encoded.
pub fn sha256_file(path: &Path) -> Result<String> {
    let file = File::open(path).map_err(|e| WpaError::tree_walk(path, e.to_string()))?;
    let mut reader = BufReader::new(file);
    let mut hasher = Sha256::new();
    let bytes = std::io::copy(&mut reader, &mut hasher)
        .map_err(|e| WpaError::tree_walk(path, e.to_string()))?;
    let actual = hex::encode(hasher.finalize());
    trace!("SHA256 {} ({} bytes) {}", actual, bytes, path.display());
    Ok(actual)
}
