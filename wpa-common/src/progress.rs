// wpa-common/src/progress.rs
//! Progress notifications emitted while the reference tree is being built.

use crate::model::{Artifact, UnresolvedReason};

/// Receives one call per event. Every method has an empty default so renderers
/// only implement what they display.
pub trait ProgressObserver: Send + Sync {
    fn artifact_started(&self, _artifact: &Artifact) {}

    /// `total` is `None` when the server sent no content length.
    fn bytes_progressed(&self, _artifact: &Artifact, _received: u64, _total: Option<u64>) {}

    fn artifact_completed(&self, _artifact: &Artifact) {}

    fn artifact_failed(&self, _artifact: &Artifact, _reason: &UnresolvedReason) {}
}

/// Observer that drops every event.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopObserver;

impl ProgressObserver for NoopObserver {}
