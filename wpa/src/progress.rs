// wpa/src/progress.rs
//! Terminal rendering of download progress.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

use colored::Colorize;
use indicatif::{MultiProgress, ProgressBar, ProgressStyle};
use wpa_common::model::{Artifact, UnresolvedReason};
use wpa_common::ProgressObserver;

/// One bar per artifact on a shared `MultiProgress`. Bars are hidden when
/// stderr is not a terminal.
pub struct ProgressReporter {
    multi: MultiProgress,
    bars: Mutex<HashMap<String, ProgressBar>>,
}

impl ProgressReporter {
    pub fn new() -> Self {
        Self {
            multi: MultiProgress::new(),
            bars: Mutex::new(HashMap::new()),
        }
    }

    fn spinner_style() -> ProgressStyle {
        ProgressStyle::with_template("{spinner:.blue.bold} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
    }

    fn bar_style() -> ProgressStyle {
        ProgressStyle::with_template(
            "{spinner:.blue.bold} {msg} [{bar:30.cyan/blue}] {bytes}/{total_bytes}",
        )
        .map(|style| style.progress_chars("#>-"))
        .unwrap_or_else(|_| ProgressStyle::default_bar())
    }

    fn take(&self, artifact: &Artifact) -> Option<ProgressBar> {
        self.bars.lock().ok()?.remove(&artifact.id())
    }

    /// Clears any bar still on screen, e.g. after a fatal error.
    pub fn finish(&self) {
        if let Ok(mut bars) = self.bars.lock() {
            for (_, bar) in bars.drain() {
                bar.finish_and_clear();
            }
        }
    }
}

impl Default for ProgressReporter {
    fn default() -> Self {
        Self::new()
    }
}

impl ProgressObserver for ProgressReporter {
    fn artifact_started(&self, artifact: &Artifact) {
        let bar = self.multi.add(ProgressBar::new_spinner());
        bar.set_style(Self::spinner_style());
        bar.set_message(artifact.id());
        bar.enable_steady_tick(Duration::from_millis(100));
        if let Ok(mut bars) = self.bars.lock() {
            bars.insert(artifact.id(), bar);
        }
    }

    fn bytes_progressed(&self, artifact: &Artifact, received: u64, total: Option<u64>) {
        let Ok(bars) = self.bars.lock() else { return };
        if let Some(bar) = bars.get(&artifact.id()) {
            if let Some(total) = total {
                if bar.length() != Some(total) {
                    bar.set_length(total);
                    bar.set_style(Self::bar_style());
                }
            }
            bar.set_position(received);
        }
    }

    fn artifact_completed(&self, artifact: &Artifact) {
        if let Some(bar) = self.take(artifact) {
            bar.finish_with_message(format!("{} {}", "✓".green(), artifact.id()));
        }
    }

    fn artifact_failed(&self, artifact: &Artifact, reason: &UnresolvedReason) {
        if let Some(bar) = self.take(artifact) {
            let mark = if reason.is_informational() {
                "·".dimmed()
            } else {
                "✗".red().bold()
            };
            bar.finish_with_message(format!("{} {}: {}", mark, artifact.id(), reason));
        }
    }
}
