// wpa-core/src/lib.rs

// Declare the top-level modules within the library crate
pub mod analysis;
pub mod check;
pub mod compare;
pub mod locate;
pub mod pipeline;

// Re-export key types for easier use by the CLI crate
pub use analysis::{Analyzer, ReferenceSource};
pub use check::VersionResolver;
pub use compare::{TreeComparator, UploadScanner};
pub use locate::ArtifactLocator;
pub use pipeline::{teardown_scratch, ReferenceBuild, ReferenceBuilder};
