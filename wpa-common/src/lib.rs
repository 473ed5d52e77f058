// wpa-common/src/lib.rs
pub mod config;
pub mod context;
pub mod error;
pub mod model;
pub mod ports;
pub mod progress;

// Re-export key types
pub use config::Config;
pub use context::{CancelToken, RunContext};
pub use error::{Result, WpaError};
pub use model::{Artifact, ArtifactKind, InstallationManifest};
pub use progress::{NoopObserver, ProgressObserver};
