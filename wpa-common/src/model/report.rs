use std::path::PathBuf;

use serde::Serialize;

use super::artifact::{Artifact, ArtifactKind, UnresolvedReason};

/// DIFF / EXTRA / MISSING classification of two trees. Each list is sorted and
/// no path appears in more than one of them.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TreeDiff {
    pub diff: Vec<String>,
    pub extra: Vec<String>,
    pub missing: Vec<String>,
}

impl TreeDiff {
    pub fn is_clean(&self) -> bool {
        self.diff.is_empty() && self.extra.is_empty() && self.missing.is_empty()
    }
}

/// The four reported path lists.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ComparisonResult {
    pub diff: Vec<String>,
    pub extra: Vec<String>,
    pub missing: Vec<String>,
    pub upload_php: Vec<String>,
}

impl ComparisonResult {
    pub fn new(tree: TreeDiff, upload_php: Vec<String>) -> Self {
        Self {
            diff: tree.diff,
            extra: tree.extra,
            missing: tree.missing,
            upload_php,
        }
    }
}

/// An artifact the run could not check, kept apart from the findings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UnresolvedArtifact {
    pub kind: ArtifactKind,
    pub slug: String,
    pub version: Option<String>,
    pub reason: UnresolvedReason,
}

impl UnresolvedArtifact {
    pub fn from_artifact(artifact: &Artifact) -> Option<Self> {
        artifact.unresolved_reason().map(|reason| Self {
            kind: artifact.kind(),
            slug: artifact.slug().to_string(),
            version: artifact.version().map(str::to_string),
            reason: reason.clone(),
        })
    }

    /// Path under which EXTRA entries are artefacts of this failure, not findings.
    pub fn install_path(&self) -> Option<String> {
        self.kind
            .container_dir()
            .map(|dir| format!("{dir}/{}", self.slug))
    }
}

/// Serialised as-is by `wpa --json`.
#[derive(Debug, Clone, Serialize)]
pub struct AnalysisReport {
    pub live_root: PathBuf,
    pub reference_root: PathBuf,
    pub core_version: Option<String>,
    pub comparison: ComparisonResult,
    pub unresolved: Vec<UnresolvedArtifact>,
}
