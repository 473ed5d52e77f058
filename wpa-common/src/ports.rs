// wpa-common/src/ports.rs
//! Interfaces the analysis engine needs from its collaborators. The concrete
//! implementations live in `wpa-net` and `wpa-aio`; tests substitute fakes.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use async_trait::async_trait;

use crate::context::CancelToken;
use crate::error::Result;
use crate::model::ArtifactKind;

/// Progress callback: bytes received so far, total if known.
pub type ProgressFn<'a> = dyn Fn(u64, Option<u64>) + Send + Sync + 'a;

#[async_trait]
pub trait ArchiveFetcher: Send + Sync {
    /// Streams `url` into `dest`, returning the number of bytes written.
    ///
    /// Fails with `NotFound` on 404 and `NetworkError`/`HttpStatus` otherwise.
    /// A cancelled or failed download leaves no file at `dest`.
    async fn fetch(
        &self,
        url: &str,
        dest: &Path,
        progress: &ProgressFn<'_>,
        cancel: &CancelToken,
    ) -> Result<u64>;
}

/// How archive entries map onto the destination directory.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExtractLayout {
    /// Leading path components dropped from every entry.
    pub strip_components: usize,
    /// Directory, relative to the destination, that the stripped entries land in.
    pub prefix: Option<PathBuf>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExtractSummary {
    pub files_written: usize,
    /// Destination paths that already existed and were overwritten.
    pub overwritten: Vec<PathBuf>,
}

pub trait ArchiveExtractor: Send + Sync {
    /// Fails with `CorruptArchive` on unreadable archives or unsafe entry paths.
    fn extract(&self, archive: &Path, dest: &Path, layout: &ExtractLayout)
        -> Result<ExtractSummary>;
}

/// What the public registry knows about one slug.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RegistryEntry {
    pub slug: String,
    pub current_version: Option<String>,
    pub current_download: Option<String>,
    /// Released version → download link, when the registry provides one.
    pub versions: BTreeMap<String, Option<String>>,
}

impl RegistryEntry {
    pub fn has_version(&self, version: &str) -> bool {
        self.versions.contains_key(version) || self.current_version.as_deref() == Some(version)
    }

    pub fn download_link(&self, version: &str) -> Option<&str> {
        match self.versions.get(version) {
            Some(Some(link)) => Some(link.as_str()),
            _ if self.current_version.as_deref() == Some(version) => {
                self.current_download.as_deref()
            }
            _ => None,
        }
    }
}

#[async_trait]
pub trait PackageRegistry: Send + Sync {
    /// `Ok(None)` means the slug is not hosted by the registry.
    async fn lookup(&self, kind: ArtifactKind, slug: &str) -> Result<Option<RegistryEntry>>;
}
