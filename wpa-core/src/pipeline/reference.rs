// wpa-core/src/pipeline/reference.rs
//! Fetches and unpacks the clean copies of every installed artifact into the
//! scratch reference tree.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio::task::JoinSet;
use tracing::{debug, error, info, instrument, warn};
use wpa_aio::fs::{list_subdirectories, remove_dir_all_if_exists};
use wpa_aio::DirectoryTree;
use wpa_common::config::Config;
use wpa_common::error::{Result, WpaError};
use wpa_common::model::{
    Artifact, ArtifactKind, InstallationManifest, UnresolvedArtifact, UnresolvedReason,
};
use wpa_common::ports::{ArchiveExtractor, ArchiveFetcher, ExtractLayout};
use wpa_common::{CancelToken, ProgressObserver, RunContext};
use wpa_net::{verify_zip_content, with_retries, RetryPolicy};

use super::scratch::ScratchLock;
use crate::locate::ArtifactLocator;

/// Result of a reference build. Dropping it releases the scratch lock.
#[derive(Debug)]
pub struct ReferenceBuild {
    pub tree: DirectoryTree,
    /// Every artifact of the manifest in its final state, core first.
    pub artifacts: Vec<Artifact>,
    pub unresolved: Vec<UnresolvedArtifact>,
    lock: ScratchLock,
}

impl ReferenceBuild {
    pub fn scratch_dir(&self) -> &Path {
        self.lock.scratch_dir()
    }
}

pub struct ReferenceBuilder {
    ctx: RunContext,
    locator: Arc<ArtifactLocator>,
    fetcher: Arc<dyn ArchiveFetcher>,
    extractor: Arc<dyn ArchiveExtractor>,
}

/// Everything one artifact task needs, cloned into the task.
#[derive(Clone)]
struct TaskEnv {
    config: Arc<Config>,
    cancel: CancelToken,
    observer: Arc<dyn ProgressObserver>,
    locator: Arc<ArtifactLocator>,
    fetcher: Arc<dyn ArchiveFetcher>,
    extractor: Arc<dyn ArchiveExtractor>,
    retry: RetryPolicy,
}

impl ReferenceBuilder {
    pub fn new(
        ctx: RunContext,
        locator: Arc<ArtifactLocator>,
        fetcher: Arc<dyn ArchiveFetcher>,
        extractor: Arc<dyn ArchiveExtractor>,
    ) -> Self {
        Self {
            ctx,
            locator,
            fetcher,
            extractor,
        }
    }

    fn env(&self) -> TaskEnv {
        TaskEnv {
            config: Arc::clone(&self.ctx.config),
            cancel: self.ctx.cancel.clone(),
            observer: Arc::clone(&self.ctx.observer),
            locator: Arc::clone(&self.locator),
            fetcher: Arc::clone(&self.fetcher),
            extractor: Arc::clone(&self.extractor),
            retry: RetryPolicy::new(self.ctx.config.max_retries, self.ctx.config.retry_backoff),
        }
    }

    /// Builds the reference tree for `manifest`. Core failures and cancellation
    /// are fatal; plugin and theme failures end up in `unresolved`.
    #[instrument(skip_all, fields(scratch = %self.ctx.scratch_dir().display()))]
    pub async fn build(&self, manifest: &InstallationManifest) -> Result<ReferenceBuild> {
        let lock = ScratchLock::acquire(&self.ctx.config)?;
        let env = self.env();
        let reference_root = self.ctx.config.reference_dir();

        let core = self.build_core(&env, manifest.core.clone()).await?;
        prune_bundled(&reference_root, manifest)?;

        let pool = self.ctx.pool();
        let mut tasks = JoinSet::new();
        for artifact in manifest.plugins.iter().chain(manifest.themes.iter()) {
            let env = env.clone();
            let pool = Arc::clone(&pool);
            let artifact = artifact.clone();
            tasks.spawn(async move {
                let _permit = pool
                    .acquire_owned()
                    .await
                    .map_err(|e| WpaError::Generic(format!("Download pool closed: {e}")))?;
                process_package(&env, artifact).await
            });
        }

        let mut packages = Vec::with_capacity(tasks.len());
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(Ok(artifact)) => packages.push(artifact),
                Ok(Err(e)) => {
                    // Dropping the set aborts whatever is still running.
                    error!("Reference build aborted: {}", e);
                    return Err(e);
                }
                Err(join_error) if join_error.is_panic() => {
                    let message = panic_message(join_error.into_panic());
                    error!("Artifact task panicked: {}", message);
                    return Err(WpaError::Generic(format!("artifact task panicked: {message}")));
                }
                Err(join_error) => {
                    return Err(WpaError::Generic(format!("artifact task failed: {join_error}")));
                }
            }
        }
        packages.sort_by(|a, b| (a.kind(), a.slug()).cmp(&(b.kind(), b.slug())));

        let mut artifacts = Vec::with_capacity(packages.len() + 1);
        artifacts.push(core);
        artifacts.extend(packages);
        let unresolved: Vec<UnresolvedArtifact> = artifacts
            .iter()
            .filter_map(UnresolvedArtifact::from_artifact)
            .collect();

        info!(
            "Reference tree ready: {} artifact(s), {} unresolved",
            artifacts.len(),
            unresolved.len()
        );
        Ok(ReferenceBuild {
            tree: DirectoryTree::open(&reference_root)?,
            artifacts,
            unresolved,
            lock,
        })
    }

    async fn build_core(&self, env: &TaskEnv, core: Artifact) -> Result<Artifact> {
        env.observer.artifact_started(&core);
        let located = env.locator.locate(core, &env.cancel).await?;
        let outcome = match located.download_url() {
            Some(_) => {
                fetch_and_extract(env, &located, ExtractLayout {
                    strip_components: 1,
                    prefix: None,
                })
                .await
            }
            None => Err((
                Stage::Download,
                WpaError::Generic(format!("core artifact {} could not be located", located.id())),
            )),
        };
        match outcome {
            Ok(()) => {
                env.observer.artifact_completed(&located);
                Ok(located)
            }
            Err((stage, e)) => {
                error!("Core {} for {} failed: {}", stage.as_str(), located.id(), e);
                env.observer.artifact_failed(&located, &stage.reason(&e));
                Err(e)
            }
        }
    }
}

/// Locate, fetch and extract one plugin or theme. Only cancellation and a
/// reference tree that cannot be cleaned up are errors.
async fn process_package(env: &TaskEnv, artifact: Artifact) -> Result<Artifact> {
    if env.cancel.is_cancelled() {
        return Err(WpaError::Cancelled);
    }
    env.observer.artifact_started(&artifact);
    let located = env.locator.locate(artifact, &env.cancel).await?;
    if let Some(reason) = located.unresolved_reason() {
        debug!("{} left unresolved: {}", located.id(), reason);
        discard_reference_copy(env, &located)?;
        env.observer.artifact_failed(&located, reason);
        return Ok(located);
    }

    let layout = ExtractLayout {
        strip_components: 1,
        prefix: Some(located.install_path()),
    };
    match fetch_and_extract(env, &located, layout).await {
        Ok(()) => {
            env.observer.artifact_completed(&located);
            Ok(located)
        }
        Err((_, WpaError::Cancelled)) => Err(WpaError::Cancelled),
        Err((stage, e)) => {
            warn!("{} {} failed: {}", located.id(), stage.as_str(), e);
            discard_reference_copy(env, &located)?;
            let reason = stage.reason(&e);
            env.observer.artifact_failed(&located, &reason);
            Ok(located.unresolved(reason))
        }
    }
}

#[derive(Debug, Clone, Copy)]
enum Stage {
    Download,
    Extract,
}

impl Stage {
    fn as_str(&self) -> &'static str {
        match self {
            Stage::Download => "download",
            Stage::Extract => "extraction",
        }
    }

    fn reason(&self, e: &WpaError) -> UnresolvedReason {
        match self {
            Stage::Download => UnresolvedReason::DownloadFailed(e.to_string()),
            Stage::Extract => UnresolvedReason::ExtractFailed(e.to_string()),
        }
    }
}

/// Removes everything under the install path of a package that has no clean
/// copy: entries a failed extraction already wrote, or a copy bundled with
/// core at some other version. Its live files then surface as EXTRA.
fn discard_reference_copy(env: &TaskEnv, artifact: &Artifact) -> Result<()> {
    let install_path = artifact.install_path();
    if install_path.as_os_str().is_empty() {
        return Ok(());
    }
    let target = env.config.reference_dir().join(install_path);
    if remove_dir_all_if_exists(&target)? {
        debug!(
            "Dropped reference copy of {} at {}",
            artifact.id(),
            target.display()
        );
    }
    Ok(())
}

async fn fetch_and_extract(
    env: &TaskEnv,
    artifact: &Artifact,
    layout: ExtractLayout,
) -> std::result::Result<(), (Stage, WpaError)> {
    let archive = obtain_archive(env, artifact)
        .await
        .map_err(|e| (Stage::Download, e))?;

    let reference_root = env.config.reference_dir();
    if let Some(prefix) = &layout.prefix {
        // A copy bundled with core is replaced by the installed release.
        remove_dir_all_if_exists(&reference_root.join(prefix)).map_err(|e| (Stage::Extract, e))?;
    }

    let extractor = Arc::clone(&env.extractor);
    let id = artifact.id();
    let summary = tokio::task::spawn_blocking(move || {
        extractor.extract(&archive, &reference_root, &layout)
    })
    .await
    .map_err(|e| {
        (
            Stage::Extract,
            WpaError::Generic(format!("extraction task for {id} failed: {e}")),
        )
    })?
    .map_err(|e| (Stage::Extract, e))?;

    if !summary.overwritten.is_empty() {
        warn!(
            "{} overwrote {} existing file(s) in the reference tree",
            artifact.id(),
            summary.overwritten.len()
        );
    }
    debug!("{}: {} file(s) extracted", artifact.id(), summary.files_written);
    Ok(())
}

/// Downloads the archive of `artifact`, or reuses a valid earlier download in
/// reuse mode. The returned file is non-empty and looks like a zip.
async fn obtain_archive(env: &TaskEnv, artifact: &Artifact) -> Result<PathBuf> {
    let url = artifact.download_url().ok_or_else(|| {
        WpaError::Generic(format!("{} has no download URL", artifact.id()))
    })?;
    let dest = env.config.downloads_dir().join(archive_file_name(artifact));

    if env.config.reuse_scratch && archive_is_usable(&dest) {
        debug!("Reusing downloaded archive {}", dest.display());
        return Ok(dest);
    }

    let observer = Arc::clone(&env.observer);
    let progress = |received: u64, total: Option<u64>| {
        observer.bytes_progressed(artifact, received, total);
    };
    let what = format!("Download of {}", artifact.id());
    let bytes = with_retries(&what, env.retry, &env.cancel, || {
        env.fetcher.fetch(url, &dest, &progress, &env.cancel)
    })
    .await?;

    if bytes == 0 {
        return Err(WpaError::CorruptArchive(format!(
            "{}: downloaded archive is empty",
            dest.display()
        )));
    }
    verify_zip_content(&dest)?;
    Ok(dest)
}

fn archive_is_usable(path: &Path) -> bool {
    std::fs::metadata(path).is_ok_and(|m| m.is_file() && m.len() > 0)
        && verify_zip_content(path).is_ok()
}

/// File name under `downloads/` for an artifact's archive.
pub fn archive_file_name(artifact: &Artifact) -> String {
    let sanitize = |raw: &str| -> String {
        raw.chars()
            .map(|c| {
                if c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.') {
                    c
                } else {
                    '_'
                }
            })
            .collect()
    };
    let version = sanitize(artifact.version().unwrap_or("unknown"));
    match artifact.kind() {
        ArtifactKind::Core => format!("wordpress-{version}.zip"),
        kind => format!("{}-{}.{}.zip", kind, sanitize(artifact.slug()), version),
    }
}

/// Core ships some plugins and themes. Copies whose slug is not installed in
/// the live tree are removed so they do not show up as MISSING.
fn prune_bundled(reference_root: &Path, manifest: &InstallationManifest) -> Result<()> {
    for (kind, installed) in [
        (ArtifactKind::Plugin, &manifest.plugins),
        (ArtifactKind::Theme, &manifest.themes),
    ] {
        let Some(container) = kind.container_dir() else {
            continue;
        };
        let slugs: BTreeSet<&str> = installed.iter().map(|a| a.slug()).collect();
        let container_dir = reference_root.join(container);
        for bundled in list_subdirectories(&container_dir)? {
            if !slugs.contains(bundled.as_str()) {
                debug!("Pruning bundled {} '{}' not installed live", kind, bundled);
                remove_dir_all_if_exists(&container_dir.join(&bundled))?;
            }
        }
    }
    Ok(())
}

fn panic_message(payload: Box<dyn std::any::Any + Send>) -> String {
    match payload.downcast_ref::<&'static str>() {
        Some(s) => (*s).to_string(),
        None => match payload.downcast_ref::<String>() {
            Some(s) => s.clone(),
            None => "Unknown panic payload".to_string(),
        },
    }
}
