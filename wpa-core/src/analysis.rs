// wpa-core/src/analysis.rs
//! One analysis run: detect, resolve, build the reference, compare and scan.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{debug, info, instrument};
use wpa_aio::{DirectoryTree, ZipExtractor};
use wpa_common::error::{Result, WpaError};
use wpa_common::model::{AnalysisReport, ComparisonResult};
use wpa_common::ports::{ArchiveExtractor, ArchiveFetcher, PackageRegistry};
use wpa_common::RunContext;
use wpa_net::{HttpFetcher, WordPressOrgRegistry};

use crate::check::{ensure_wordpress, VersionResolver};
use crate::compare::{TreeComparator, UploadScanner};
use crate::locate::ArtifactLocator;
use crate::pipeline::ReferenceBuilder;

/// Where the clean side of the comparison comes from.
#[derive(Debug, Clone)]
pub enum ReferenceSource {
    /// Fetch pristine archives for the live tree's versions.
    Download { version_override: Option<String> },
    /// Compare against another installation already on disk.
    Existing(PathBuf),
}

pub struct Analyzer {
    ctx: RunContext,
    registry: Arc<dyn PackageRegistry>,
    fetcher: Arc<dyn ArchiveFetcher>,
    extractor: Arc<dyn ArchiveExtractor>,
}

impl Analyzer {
    /// Wires the WordPress.org registry, the HTTP fetcher and the zip extractor.
    pub fn new(ctx: RunContext) -> Result<Self> {
        let registry = Arc::new(WordPressOrgRegistry::new(&ctx.config)?);
        let fetcher = Arc::new(HttpFetcher::new(&ctx.config)?);
        Ok(Self::with_collaborators(
            ctx,
            registry,
            fetcher,
            Arc::new(ZipExtractor),
        ))
    }

    pub fn with_collaborators(
        ctx: RunContext,
        registry: Arc<dyn PackageRegistry>,
        fetcher: Arc<dyn ArchiveFetcher>,
        extractor: Arc<dyn ArchiveExtractor>,
    ) -> Self {
        Self {
            ctx,
            registry,
            fetcher,
            extractor,
        }
    }

    #[instrument(skip(self, source), fields(live = %live_root.display()))]
    pub async fn run(&self, live_root: &Path, source: ReferenceSource) -> Result<AnalysisReport> {
        ensure_wordpress(live_root)?;
        let live = DirectoryTree::open(live_root)?;

        let (reference, core_version, unresolved, build) = match source {
            ReferenceSource::Existing(other_root) => {
                ensure_wordpress(&other_root)?;
                let core_version = VersionResolver::new(live_root).core_version().ok();
                (DirectoryTree::open(&other_root)?, core_version, Vec::new(), None)
            }
            ReferenceSource::Download { version_override } => {
                let manifest =
                    VersionResolver::new(live_root).resolve(version_override.as_deref())?;
                info!(
                    "WordPress {} with {} plugin(s) and {} theme(s)",
                    manifest.core.version().unwrap_or("?"),
                    manifest.plugins.len(),
                    manifest.themes.len()
                );
                let locator = Arc::new(ArtifactLocator::new(
                    Arc::clone(&self.registry),
                    &self.ctx.config,
                ));
                let builder = ReferenceBuilder::new(
                    self.ctx.clone(),
                    locator,
                    Arc::clone(&self.fetcher),
                    Arc::clone(&self.extractor),
                );
                let build = builder.build(&manifest).await?;
                (
                    build.tree.clone(),
                    manifest.core.version().map(str::to_string),
                    build.unresolved.clone(),
                    Some(build),
                )
            }
        };

        if self.ctx.cancel.is_cancelled() {
            return Err(WpaError::Cancelled);
        }

        let comparator = TreeComparator::new(&self.ctx.config.ignore_prefixes);
        let scanner = UploadScanner::new(
            self.ctx.config.upload_subdir.clone(),
            &self.ctx.config.script_extensions,
        );
        let (tree_live, tree_reference, scan_live) = (live.clone(), reference.clone(), live);
        let (tree_diff, upload_php) = tokio::join!(
            tokio::task::spawn_blocking(move || comparator.compare(&tree_live, &tree_reference)),
            tokio::task::spawn_blocking(move || scanner.scan(&scan_live)),
        );
        let tree_diff = tree_diff
            .map_err(|e| WpaError::Generic(format!("comparison task failed: {e}")))??;
        let upload_php =
            upload_php.map_err(|e| WpaError::Generic(format!("upload scan task failed: {e}")))??;

        // Releases the scratch lock; the reference tree itself stays on disk.
        drop(build);
        debug!("Analysis of {} finished", live_root.display());

        Ok(AnalysisReport {
            live_root: live_root.to_path_buf(),
            reference_root: reference.root().to_path_buf(),
            core_version,
            comparison: ComparisonResult::new(tree_diff, upload_php),
            unresolved,
        })
    }
}
