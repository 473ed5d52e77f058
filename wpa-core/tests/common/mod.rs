// Shared fixtures for the wpa-core integration tests.
#![allow(dead_code)]

use std::collections::HashMap;
use std::fs;
use std::io::{Cursor, Write};
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use wpa_common::error::{Result, WpaError};
use wpa_common::model::{Artifact, ArtifactKind, UnresolvedReason};
use wpa_common::ports::{ArchiveFetcher, PackageRegistry, ProgressFn, RegistryEntry};
use wpa_common::{CancelToken, Config, ProgressObserver};
use zip::write::SimpleFileOptions;
use zip::ZipWriter;

pub const CORE_URL: &str = "https://wordpress.org/wordpress-6.5.zip";
pub const AKISMET_URL: &str = "https://downloads.wordpress.org/plugin/akismet.5.3.zip";
pub const THEME_URL: &str = "https://downloads.wordpress.org/theme/twentytwentyfour.1.1.zip";

pub fn write_files(root: &Path, files: &[(&str, &str)]) {
    for (rel, body) in files {
        let path = root.join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, body).unwrap();
    }
}

pub fn zip_bytes(entries: &[(&str, &str)]) -> Vec<u8> {
    let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
    for (name, body) in entries {
        zip.start_file(*name, SimpleFileOptions::default()).unwrap();
        zip.write_all(body.as_bytes()).unwrap();
    }
    zip.finish().unwrap().into_inner()
}

pub const VERSION_PHP: &str = "<?php\n$wp_version = '6.5';\n$wp_db_version = 57155;\n";
pub const AKISMET_README: &str = "=== Akismet ===\nStable tag: 5.3\n";
pub const AKISMET_PHP: &str = "<?php\n/*\nPlugin Name: Akismet\nVersion: 5.3\n*/\n";
pub const THEME_CSS: &str = "/*\nTheme Name: Twenty Twenty-Four\nVersion: 1.1\n*/\n";

/// A live install with one tampered core file, a config file, a deleted core
/// file, a premium plugin and a script in the uploads area.
pub fn live_install(root: &Path) {
    write_files(
        root,
        &[
            ("wp-login.php", "<?php // login"),
            ("wp-blog-header.php", "<?php // header\neval($_POST['x']);"),
            ("wp-admin/admin-ajax.php", "<?php // ajax"),
            ("wp-includes/version.php", VERSION_PHP),
            ("wp-load.php", "<?php // load"),
            ("wp-config.php", "<?php define('DB_NAME', 'site');"),
            ("wp-content/plugins/akismet/readme.txt", AKISMET_README),
            ("wp-content/plugins/akismet/akismet.php", AKISMET_PHP),
            (
                "wp-content/plugins/gravityforms/gravityforms.php",
                "<?php\n/*\nPlugin Name: Gravity Forms\nVersion: 2.8\n*/",
            ),
            ("wp-content/themes/twentytwentyfour/style.css", THEME_CSS),
            ("wp-content/uploads/2024/05/x.php", "<?php system($_GET['c']);"),
            ("wp-content/uploads/2024/05/image.jpg", "jpeg"),
        ],
    );
}

pub fn core_archive() -> Vec<u8> {
    zip_bytes(&[
        ("wordpress/wp-login.php", "<?php // login"),
        ("wordpress/wp-blog-header.php", "<?php // header"),
        ("wordpress/wp-admin/admin-ajax.php", "<?php // ajax"),
        ("wordpress/wp-includes/version.php", VERSION_PHP),
        ("wordpress/wp-load.php", "<?php // load"),
        ("wordpress/wp-cron.php", "<?php // cron"),
        ("wordpress/wp-content/plugins/akismet/akismet.php", "<?php // bundled 5.0"),
        ("wordpress/wp-content/plugins/hello.php", "<?php // dolly"),
        ("wordpress/wp-content/themes/twentytwentythree/style.css", "/* old */"),
        ("wordpress/wp-content/themes/twentytwentyfour/style.css", "/* bundled */"),
    ])
}

pub fn akismet_archive() -> Vec<u8> {
    zip_bytes(&[
        ("akismet/readme.txt", AKISMET_README),
        ("akismet/akismet.php", AKISMET_PHP),
    ])
}

pub fn theme_archive() -> Vec<u8> {
    zip_bytes(&[("twentytwentyfour/style.css", THEME_CSS)])
}

pub fn test_config(scratch: &Path) -> Config {
    Config {
        scratch_dir: scratch.to_path_buf(),
        retry_backoff: Duration::from_millis(1),
        ..Config::default()
    }
}

/// Registry answering from a fixed table; unknown slugs are not hosted.
#[derive(Default)]
pub struct FakeRegistry {
    entries: HashMap<(ArtifactKind, String), RegistryEntry>,
    pub calls: AtomicUsize,
}

impl FakeRegistry {
    pub fn with(mut self, kind: ArtifactKind, slug: &str, versions: &[&str]) -> Self {
        let entry = RegistryEntry {
            slug: slug.to_string(),
            current_version: versions.last().map(|v| v.to_string()),
            current_download: None,
            versions: versions.iter().map(|v| (v.to_string(), None)).collect(),
        };
        self.entries.insert((kind, slug.to_string()), entry);
        self
    }

    pub fn wordpress_org() -> Self {
        Self::default()
            .with(ArtifactKind::Plugin, "akismet", &["5.2", "5.3"])
            .with(ArtifactKind::Theme, "twentytwentyfour", &["1.0", "1.1"])
    }
}

#[async_trait]
impl PackageRegistry for FakeRegistry {
    async fn lookup(&self, kind: ArtifactKind, slug: &str) -> Result<Option<RegistryEntry>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.entries.get(&(kind, slug.to_string())).cloned())
    }
}

/// Fetcher serving in-memory archives by URL.
#[derive(Default)]
pub struct FakeFetcher {
    archives: HashMap<String, Vec<u8>>,
    pub requested: Mutex<Vec<String>>,
}

impl FakeFetcher {
    pub fn serving(mut self, url: &str, body: Vec<u8>) -> Self {
        self.archives.insert(url.to_string(), body);
        self
    }

    pub fn wordpress_org() -> Self {
        Self::default()
            .serving(CORE_URL, core_archive())
            .serving(AKISMET_URL, akismet_archive())
            .serving(THEME_URL, theme_archive())
    }

    pub fn request_count(&self) -> usize {
        self.requested.lock().unwrap().len()
    }
}

#[async_trait]
impl ArchiveFetcher for FakeFetcher {
    async fn fetch(
        &self,
        url: &str,
        dest: &Path,
        progress: &ProgressFn<'_>,
        cancel: &CancelToken,
    ) -> Result<u64> {
        self.requested.lock().unwrap().push(url.to_string());
        if cancel.is_cancelled() {
            return Err(WpaError::Cancelled);
        }
        let body = self
            .archives
            .get(url)
            .ok_or_else(|| WpaError::NotFound(format!("{url} returned 404")))?;
        fs::create_dir_all(dest.parent().unwrap())?;
        fs::write(dest, body)?;
        let len = body.len() as u64;
        progress(len, Some(len));
        Ok(len)
    }
}

/// Wraps a fetcher and records the largest number of fetches running at once.
pub struct TrackingFetcher {
    pub inner: FakeFetcher,
    delay: Duration,
    in_flight: AtomicUsize,
    pub max_in_flight: AtomicUsize,
}

impl TrackingFetcher {
    pub fn new(inner: FakeFetcher, delay: Duration) -> Self {
        Self {
            inner,
            delay,
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl ArchiveFetcher for TrackingFetcher {
    async fn fetch(
        &self,
        url: &str,
        dest: &Path,
        progress: &ProgressFn<'_>,
        cancel: &CancelToken,
    ) -> Result<u64> {
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        tokio::time::sleep(self.delay).await;
        let result = self.inner.fetch(url, dest, progress, cancel).await;
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        result
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    Started(String),
    Completed(String),
    Failed(String, UnresolvedReason),
}

#[derive(Default)]
pub struct RecordingObserver {
    pub events: Mutex<Vec<Event>>,
    pub bytes: AtomicUsize,
}

impl ProgressObserver for RecordingObserver {
    fn artifact_started(&self, artifact: &Artifact) {
        self.events
            .lock()
            .unwrap()
            .push(Event::Started(artifact.slug().to_string()));
    }

    fn bytes_progressed(&self, _artifact: &Artifact, received: u64, _total: Option<u64>) {
        self.bytes.fetch_add(received as usize, Ordering::SeqCst);
    }

    fn artifact_completed(&self, artifact: &Artifact) {
        self.events
            .lock()
            .unwrap()
            .push(Event::Completed(artifact.slug().to_string()));
    }

    fn artifact_failed(&self, artifact: &Artifact, reason: &UnresolvedReason) {
        self.events
            .lock()
            .unwrap()
            .push(Event::Failed(artifact.slug().to_string(), reason.clone()));
    }
}

pub fn shared<T>(value: T) -> Arc<T> {
    Arc::new(value)
}
