// wpa-core/src/locate.rs
//! Maps installed artifacts to canonical download URLs.

use std::sync::Arc;

use tracing::{debug, instrument, warn};
use wpa_common::config::Config;
use wpa_common::error::{Result, WpaError};
use wpa_common::model::{Artifact, ArtifactKind, UnresolvedReason};
use wpa_common::ports::PackageRegistry;
use wpa_common::CancelToken;
use wpa_net::{with_retries, RetryPolicy};

/// `{base}/wordpress-{version}.zip`
pub fn core_archive_url(base: &str, version: &str) -> String {
    format!("{}/wordpress-{}.zip", base.trim_end_matches('/'), version)
}

/// `{base}/{plugin|theme}/{slug}.{version}.zip`
pub fn package_archive_url(base: &str, kind: ArtifactKind, slug: &str, version: &str) -> String {
    format!(
        "{}/{}/{}.{}.zip",
        base.trim_end_matches('/'),
        kind.as_str(),
        slug,
        version
    )
}

/// Slugs become URL path segments and directory names; anything that could
/// escape either is refused.
pub fn is_safe_slug(slug: &str) -> bool {
    !slug.is_empty()
        && slug != "."
        && slug != ".."
        && !slug.contains("..")
        && slug
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'))
}

pub struct ArtifactLocator {
    registry: Arc<dyn PackageRegistry>,
    core_download_base: String,
    download_base: String,
    retry: RetryPolicy,
}

impl ArtifactLocator {
    pub fn new(registry: Arc<dyn PackageRegistry>, config: &Config) -> Self {
        Self {
            registry,
            core_download_base: config.core_download_base_url.clone(),
            download_base: config.download_base_url.clone(),
            retry: RetryPolicy::new(config.max_retries, config.retry_backoff),
        }
    }

    /// Returns the artifact located or marked unresolved. Only cancellation is an error.
    #[instrument(skip(self, artifact, cancel), fields(artifact = %artifact.id()))]
    pub async fn locate(&self, artifact: Artifact, cancel: &CancelToken) -> Result<Artifact> {
        let Some(version) = artifact.version().map(str::to_string) else {
            debug!("Version unknown, nothing to locate");
            return Ok(artifact);
        };

        if artifact.kind() == ArtifactKind::Core {
            let url = core_archive_url(&self.core_download_base, &version);
            return Ok(artifact.located(url));
        }

        if !is_safe_slug(artifact.slug()) {
            warn!("Refusing to look up unsafe slug '{}'", artifact.slug());
            return Ok(artifact.unresolved(UnresolvedReason::LookupFailed("invalid slug".into())));
        }

        let kind = artifact.kind();
        let slug = artifact.slug().to_string();
        let what = format!("Registry lookup for {kind} '{slug}'");
        let lookup = with_retries(&what, self.retry, cancel, || {
            self.registry.lookup(kind, &slug)
        })
        .await;

        match lookup {
            Ok(None) => {
                debug!("'{}' is not in the public registry", slug);
                Ok(artifact.unresolved(UnresolvedReason::NotInRegistry))
            }
            Ok(Some(entry)) if !entry.has_version(&version) => {
                debug!(
                    "'{}' has no release {} (current: {:?})",
                    slug, version, entry.current_version
                );
                Ok(artifact.unresolved(UnresolvedReason::VersionNotAvailable(version)))
            }
            Ok(Some(entry)) => {
                let url = entry.download_link(&version).map_or_else(
                    || package_archive_url(&self.download_base, kind, &slug, &version),
                    str::to_string,
                );
                debug!("Located {} at {}", slug, url);
                Ok(artifact.located(url))
            }
            Err(WpaError::Cancelled) => Err(WpaError::Cancelled),
            Err(e) => {
                warn!("{} failed: {}", what, e);
                Ok(artifact.unresolved(UnresolvedReason::LookupFailed(e.to_string())))
            }
        }
    }
}
