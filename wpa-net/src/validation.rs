// wpa-net/src/validation.rs
use std::path::Path;

use url::{Host, Url};
use wpa_common::error::{Result, WpaError};

/// Validates a URL, ensuring it uses the HTTPS scheme. Plain HTTP is only
/// accepted for loopback hosts (local mirrors and test servers).
pub fn validate_url(url_str: &str) -> Result<Url> {
    let url = Url::parse(url_str)
        .map_err(|e| WpaError::ValidationError(format!("Failed to parse URL '{url_str}': {e}")))?;
    match url.scheme() {
        "https" => Ok(url),
        "http" if is_loopback(&url) => Ok(url),
        other => Err(WpaError::ValidationError(format!(
            "Invalid URL scheme for '{url_str}': Must be https, but got '{other}'"
        ))),
    }
}

fn is_loopback(url: &Url) -> bool {
    match url.host() {
        Some(Host::Domain(domain)) => domain == "localhost",
        Some(Host::Ipv4(ip)) => ip.is_loopback(),
        Some(Host::Ipv6(ip)) => ip.is_loopback(),
        None => false,
    }
}

/// Verifies that the magic bytes of a downloaded file identify it as a zip archive.
pub fn verify_zip_content(path: &Path) -> Result<()> {
    match infer::get_from_path(path)? {
        Some(kind) if kind.extension().eq_ignore_ascii_case("zip") => {
            tracing::debug!("Content type verified as zip: {}", path.display());
            Ok(())
        }
        Some(kind) => Err(WpaError::CorruptArchive(format!(
            "{} is not a zip archive (detected '{}')",
            path.display(),
            kind.extension()
        ))),
        None => Err(WpaError::CorruptArchive(format!(
            "Could not determine content type for {}",
            path.display()
        ))),
    }
}
