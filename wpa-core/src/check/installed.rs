// wpa-core/src/check/installed.rs
//! Reads the declared core version and the installed plugins and themes of a
//! live tree. Read-only.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use regex::Regex;
use tracing::{debug, instrument, warn};
use wpa_common::config::{WP_PLUGINS_DIR, WP_THEMES_DIR, WP_VERSION_FILE};
use wpa_common::error::{Result, WpaError};
use wpa_common::model::{Artifact, ArtifactKind, InstallationManifest, VersionLookup};

static WP_VERSION_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"\$wp_version\s*=\s*['"]([^'"]+)['"]"#).expect("static regex")
});

/// Extracts the version from the text of `wp-includes/version.php`.
pub fn parse_core_version(text: &str) -> Option<String> {
    WP_VERSION_RE
        .captures(text)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Value following `key` on the first line that contains it and has a non-empty value.
pub fn header_value(text: &str, key: &str) -> Option<String> {
    text.lines().find_map(|line| {
        let pos = line.find(key)?;
        let value = line[pos + key.len()..]
            .trim()
            .trim_end_matches("*/")
            .trim();
        (!value.is_empty()).then(|| value.to_string())
    })
}

fn read_text(path: &Path) -> Option<String> {
    match fs::read(path) {
        Ok(bytes) => Some(String::from_utf8_lossy(&bytes).into_owned()),
        Err(e) => {
            if path.exists() {
                warn!("Could not read {}: {}", path.display(), e);
            }
            None
        }
    }
}

/// Probes the usual header locations of one plugin directory.
pub fn plugin_version(plugin_dir: &Path, slug: &str) -> VersionLookup {
    let candidates = [
        (plugin_dir.join("readme.txt"), "Stable tag:"),
        (plugin_dir.join(format!("{slug}.php")), "Version:"),
        (
            plugin_dir.join(format!("{}.php", slug.replace('-', "_"))),
            "Version:",
        ),
    ];
    for (path, key) in &candidates {
        if let Some(version) = read_text(path).and_then(|text| header_value(&text, key)) {
            if version.eq_ignore_ascii_case("trunk") {
                debug!("{} declares trunk, trying next header", path.display());
                continue;
            }
            return VersionLookup::Resolved(version);
        }
    }

    // Main plugin file under another name: any top-level PHP file with a plugin header.
    if let Ok(entries) = fs::read_dir(plugin_dir) {
        let mut php_files: Vec<PathBuf> = entries
            .filter_map(|e| e.ok())
            .map(|e| e.path())
            .filter(|p| p.is_file() && p.extension().is_some_and(|ext| ext == "php"))
            .collect();
        php_files.sort();
        for path in php_files {
            let Some(text) = read_text(&path) else { continue };
            if header_value(&text, "Plugin Name:").is_none() {
                continue;
            }
            if let Some(version) = header_value(&text, "Version:") {
                return VersionLookup::Resolved(version);
            }
        }
    }

    VersionLookup::Unresolved(format!("no version header found in {}", plugin_dir.display()))
}

pub fn theme_version(theme_dir: &Path) -> VersionLookup {
    let stylesheet = theme_dir.join("style.css");
    match read_text(&stylesheet).and_then(|text| header_value(&text, "Version:")) {
        Some(version) => VersionLookup::Resolved(version),
        None => VersionLookup::Unresolved(format!(
            "no Version header in {}",
            stylesheet.display()
        )),
    }
}

#[derive(Debug, Clone)]
pub struct VersionResolver {
    root: PathBuf,
}

impl VersionResolver {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn core_version(&self) -> Result<String> {
        let version_file = self.root.join(WP_VERSION_FILE);
        let text = read_text(&version_file)
            .ok_or_else(|| WpaError::VersionNotFound(version_file.clone()))?;
        parse_core_version(&text).ok_or(WpaError::VersionNotFound(version_file))
    }

    pub fn plugins(&self) -> Result<Vec<Artifact>> {
        self.enumerate(ArtifactKind::Plugin, WP_PLUGINS_DIR, |dir, slug| {
            plugin_version(dir, slug)
        })
    }

    pub fn themes(&self) -> Result<Vec<Artifact>> {
        self.enumerate(ArtifactKind::Theme, WP_THEMES_DIR, |dir, _| theme_version(dir))
    }

    fn enumerate<F>(&self, kind: ArtifactKind, container: &str, probe: F) -> Result<Vec<Artifact>>
    where
        F: Fn(&Path, &str) -> VersionLookup,
    {
        let container_dir = self.root.join(container);
        let slugs = wpa_aio::fs::list_subdirectories(&container_dir)
            .map_err(|e| WpaError::tree_walk(&container_dir, e.to_string()))?;
        let artifacts: Vec<Artifact> = slugs
            .into_iter()
            .map(|slug| {
                let version = probe(&container_dir.join(&slug), &slug);
                if let VersionLookup::Unresolved(why) = &version {
                    warn!("Could not find {} version for '{}': {}", kind, slug, why);
                }
                Artifact::installed(kind, slug, version)
            })
            .collect();
        debug!(
            "Found {} {}(s) under {}",
            artifacts.len(),
            kind,
            container_dir.display()
        );
        Ok(artifacts)
    }

    /// Builds the manifest. With `core_override` the version file is not read.
    #[instrument(skip(self), fields(root = %self.root.display()))]
    pub fn resolve(&self, core_override: Option<&str>) -> Result<InstallationManifest> {
        let core_version = match core_override {
            Some(version) => {
                debug!("Using explicit core version {}", version);
                version.to_string()
            }
            None => self.core_version()?,
        };
        Ok(InstallationManifest::new(
            Artifact::core(core_version),
            self.plugins()?,
            self.themes()?,
        ))
    }
}
