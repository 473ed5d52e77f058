// wpa-common/src/model/artifact.rs
use std::fmt;
use std::path::PathBuf;

use serde::Serialize;

use crate::config::{WP_PLUGINS_DIR, WP_THEMES_DIR};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ArtifactKind {
    Core,
    Plugin,
    Theme,
}

impl ArtifactKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ArtifactKind::Core => "core",
            ArtifactKind::Plugin => "plugin",
            ArtifactKind::Theme => "theme",
        }
    }

    /// Directory, relative to the install root, that holds one subdirectory per slug.
    pub fn container_dir(&self) -> Option<&'static str> {
        match self {
            ArtifactKind::Core => None,
            ArtifactKind::Plugin => Some(WP_PLUGINS_DIR),
            ArtifactKind::Theme => Some(WP_THEMES_DIR),
        }
    }
}

impl fmt::Display for ArtifactKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of reading a declared version out of installed metadata.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VersionLookup {
    Resolved(String),
    Unresolved(String),
}

impl VersionLookup {
    pub fn as_resolved(&self) -> Option<&str> {
        match self {
            VersionLookup::Resolved(v) => Some(v.as_str()),
            VersionLookup::Unresolved(_) => None,
        }
    }
}

/// Why an artifact has no usable reference copy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "reason", content = "detail", rename_all = "snake_case")]
pub enum UnresolvedReason {
    /// Version known, registry not consulted yet.
    NotYetLocated,
    NoVersionHeader(String),
    NotInRegistry,
    VersionNotAvailable(String),
    LookupFailed(String),
    DownloadFailed(String),
    ExtractFailed(String),
}

impl UnresolvedReason {
    /// True for the expected premium/private package case, false for real failures.
    pub fn is_informational(&self) -> bool {
        matches!(
            self,
            UnresolvedReason::NoVersionHeader(_)
                | UnresolvedReason::NotInRegistry
                | UnresolvedReason::VersionNotAvailable(_)
        )
    }
}

impl fmt::Display for UnresolvedReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UnresolvedReason::NotYetLocated => f.write_str("not located"),
            UnresolvedReason::NoVersionHeader(detail) => {
                write!(f, "no version header ({detail})")
            }
            UnresolvedReason::NotInRegistry => f.write_str("not in the public registry"),
            UnresolvedReason::VersionNotAvailable(v) => {
                write!(f, "version {v} is not available in the registry")
            }
            UnresolvedReason::LookupFailed(e) => write!(f, "registry lookup failed: {e}"),
            UnresolvedReason::DownloadFailed(e) => write!(f, "download failed: {e}"),
            UnresolvedReason::ExtractFailed(e) => write!(f, "extraction failed: {e}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ArtifactSource {
    Resolved { url: String },
    Unresolved { reason: UnresolvedReason },
}

/// One downloadable unit (core, a plugin or a theme) at a specific version.
///
/// State changes consume the artifact and hand back a new value, so a located
/// artifact can never be modified behind the builder's back.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Artifact {
    kind: ArtifactKind,
    slug: String,
    version: VersionLookup,
    source: ArtifactSource,
}

impl Artifact {
    pub fn installed(kind: ArtifactKind, slug: impl Into<String>, version: VersionLookup) -> Self {
        let reason = match &version {
            VersionLookup::Resolved(_) => UnresolvedReason::NotYetLocated,
            VersionLookup::Unresolved(why) => UnresolvedReason::NoVersionHeader(why.clone()),
        };
        Self {
            kind,
            slug: slug.into(),
            version,
            source: ArtifactSource::Unresolved { reason },
        }
    }

    pub fn core(version: impl Into<String>) -> Self {
        Self::installed(
            ArtifactKind::Core,
            "wordpress",
            VersionLookup::Resolved(version.into()),
        )
    }

    /// Attaches a download URL. An artifact without a known version is returned unchanged.
    pub fn located(self, url: impl Into<String>) -> Self {
        if self.version.as_resolved().is_none() {
            return self;
        }
        Self {
            source: ArtifactSource::Resolved { url: url.into() },
            ..self
        }
    }

    pub fn unresolved(self, reason: UnresolvedReason) -> Self {
        Self {
            source: ArtifactSource::Unresolved { reason },
            ..self
        }
    }

    pub fn kind(&self) -> ArtifactKind {
        self.kind
    }

    pub fn slug(&self) -> &str {
        &self.slug
    }

    pub fn version(&self) -> Option<&str> {
        self.version.as_resolved()
    }

    pub fn download_url(&self) -> Option<&str> {
        match &self.source {
            ArtifactSource::Resolved { url } => Some(url.as_str()),
            ArtifactSource::Unresolved { .. } => None,
        }
    }

    pub fn unresolved_reason(&self) -> Option<&UnresolvedReason> {
        match &self.source {
            ArtifactSource::Resolved { .. } => None,
            ArtifactSource::Unresolved { reason } => Some(reason),
        }
    }

    pub fn is_resolved(&self) -> bool {
        matches!(self.source, ArtifactSource::Resolved { .. })
    }

    /// Where this artifact's files live, relative to an install root.
    pub fn install_path(&self) -> PathBuf {
        match self.kind.container_dir() {
            Some(dir) => PathBuf::from(dir).join(&self.slug),
            None => PathBuf::new(),
        }
    }

    /// Short stable identifier used in logs and progress events.
    pub fn id(&self) -> String {
        match self.version() {
            Some(v) => format!("{}:{}@{}", self.kind, self.slug, v),
            None => format!("{}:{}", self.kind, self.slug),
        }
    }
}

impl fmt::Display for Artifact {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} {}",
            self.kind,
            self.slug,
            self.version().unwrap_or("?")
        )
    }
}
