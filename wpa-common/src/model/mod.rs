// wpa-common/src/model/mod.rs
pub mod artifact;
pub mod manifest;
pub mod report;

pub use artifact::{Artifact, ArtifactKind, ArtifactSource, UnresolvedReason, VersionLookup};
pub use manifest::InstallationManifest;
pub use report::{AnalysisReport, ComparisonResult, TreeDiff, UnresolvedArtifact};
