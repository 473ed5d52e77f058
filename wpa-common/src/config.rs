// wpa-common/src/config.rs
use std::env;
use std::path::{Path, PathBuf};
use std::time::Duration;

use directories::ProjectDirs;
use tracing::debug;

use super::error::{Result, WpaError};

const DEFAULT_API_BASE_URL: &str = "https://api.wordpress.org";
const DEFAULT_DOWNLOAD_BASE_URL: &str = "https://downloads.wordpress.org";
const DEFAULT_CORE_DOWNLOAD_BASE_URL: &str = "https://wordpress.org";
const FALLBACK_SCRATCH_DIR: &str = "wpa-temp";

const DEFAULT_MAX_DOWNLOADS: usize = 4;
const DEFAULT_MAX_RETRIES: u32 = 3;
const DEFAULT_RETRY_BACKOFF: Duration = Duration::from_millis(500);
const DEFAULT_HTTP_TIMEOUT: Duration = Duration::from_secs(300);
const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(30);

/// Relative path of the file holding `$wp_version`.
pub const WP_VERSION_FILE: &str = "wp-includes/version.php";
pub const WP_PLUGINS_DIR: &str = "wp-content/plugins";
pub const WP_THEMES_DIR: &str = "wp-content/themes";
pub const WP_UPLOADS_DIR: &str = "wp-content/uploads";

/// Files that must all be present for a directory to count as a WordPress install.
pub const WP_COMMON_FILES: &[&str] = &[
    "wp-login.php",
    "wp-blog-header.php",
    "wp-admin/admin-ajax.php",
    WP_VERSION_FILE,
];

/// Extensions the PHP processor may execute.
pub const DEFAULT_SCRIPT_EXTENSIONS: &[&str] =
    &["php", "phtml", "php3", "php4", "php5", "phps", "phar", "pht"];

const LOCK_FILENAME: &str = ".wpa.lock";

#[derive(Debug, Clone)]
pub struct Config {
    pub scratch_dir: PathBuf,
    pub reuse_scratch: bool,
    pub api_base_url: String,
    pub download_base_url: String,
    pub core_download_base_url: String,
    pub max_concurrent_downloads: usize,
    pub max_retries: u32,
    pub retry_backoff: Duration,
    pub http_timeout: Duration,
    pub connect_timeout: Duration,
    pub upload_subdir: String,
    pub script_extensions: Vec<String>,
    pub ignore_prefixes: Vec<String>,
}

impl Config {
    pub fn load() -> Result<Self> {
        debug!("Loading wpa configuration");
        let mut config = Self::default();

        if let Some(dir) = env_var("WPA_SCRATCH_DIR") {
            config.scratch_dir = PathBuf::from(dir);
        }
        if let Some(url) = env_var("WPA_API_BASE_URL") {
            config.api_base_url = url;
        }
        if let Some(url) = env_var("WPA_DOWNLOAD_BASE_URL") {
            config.download_base_url = url;
        }
        if let Some(url) = env_var("WPA_CORE_DOWNLOAD_BASE_URL") {
            config.core_download_base_url = url;
        }
        if let Some(raw) = env_var("WPA_MAX_DOWNLOADS") {
            config.max_concurrent_downloads = parse_number("WPA_MAX_DOWNLOADS", &raw)?;
        }
        if let Some(raw) = env_var("WPA_MAX_RETRIES") {
            config.max_retries = parse_number("WPA_MAX_RETRIES", &raw)?;
        }
        if let Some(raw) = env_var("WPA_HTTP_TIMEOUT") {
            config.http_timeout = parse_duration("WPA_HTTP_TIMEOUT", &raw)?;
        }
        if let Some(raw) = env_var("WPA_CONNECT_TIMEOUT") {
            config.connect_timeout = parse_duration("WPA_CONNECT_TIMEOUT", &raw)?;
        }
        if let Some(raw) = env_var("WPA_RETRY_BACKOFF") {
            config.retry_backoff = parse_duration("WPA_RETRY_BACKOFF", &raw)?;
        }

        config.validate()?;
        debug!(
            "Configuration loaded: scratch={} downloads={} retries={}",
            config.scratch_dir.display(),
            config.max_concurrent_downloads,
            config.max_retries
        );
        Ok(config)
    }

    /// Rejects values that would make the run hang or spin.
    pub fn validate(&self) -> Result<()> {
        if self.max_concurrent_downloads == 0 {
            return Err(WpaError::Config(
                "max concurrent downloads must be at least 1".to_string(),
            ));
        }
        if self.max_retries == 0 {
            return Err(WpaError::Config("max retries must be at least 1".to_string()));
        }
        if self.http_timeout.is_zero() || self.connect_timeout.is_zero() {
            return Err(WpaError::Config("timeouts must be non-zero".to_string()));
        }
        Ok(())
    }

    pub fn scratch_dir(&self) -> &Path {
        &self.scratch_dir
    }

    /// Downloaded archives live here, outside the reference tree.
    pub fn downloads_dir(&self) -> PathBuf {
        self.scratch_dir.join("downloads")
    }

    /// Root of the freshly built reference tree.
    pub fn reference_dir(&self) -> PathBuf {
        self.scratch_dir.join("reference")
    }

    pub fn lock_path(&self) -> PathBuf {
        self.scratch_dir.join(LOCK_FILENAME)
    }

    pub fn lock_filename() -> &'static str {
        LOCK_FILENAME
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            scratch_dir: default_scratch_dir(),
            reuse_scratch: false,
            api_base_url: DEFAULT_API_BASE_URL.to_string(),
            download_base_url: DEFAULT_DOWNLOAD_BASE_URL.to_string(),
            core_download_base_url: DEFAULT_CORE_DOWNLOAD_BASE_URL.to_string(),
            max_concurrent_downloads: DEFAULT_MAX_DOWNLOADS,
            max_retries: DEFAULT_MAX_RETRIES,
            retry_backoff: DEFAULT_RETRY_BACKOFF,
            http_timeout: DEFAULT_HTTP_TIMEOUT,
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            upload_subdir: WP_UPLOADS_DIR.to_string(),
            script_extensions: DEFAULT_SCRIPT_EXTENSIONS
                .iter()
                .map(|s| s.to_string())
                .collect(),
            ignore_prefixes: vec![WP_UPLOADS_DIR.to_string()],
        }
    }
}

fn default_scratch_dir() -> PathBuf {
    ProjectDirs::from("org", "wpa", "wpa").map_or_else(
        || PathBuf::from(FALLBACK_SCRATCH_DIR),
        |dirs| dirs.cache_dir().join("scratch"),
    )
}

fn env_var(name: &str) -> Option<String> {
    env::var(name).ok().filter(|s| !s.trim().is_empty())
}

fn parse_number<T: std::str::FromStr>(name: &str, raw: &str) -> Result<T> {
    raw.trim()
        .parse::<T>()
        .map_err(|_| WpaError::Config(format!("{name} must be a positive number, got '{raw}'")))
}

fn parse_duration(name: &str, raw: &str) -> Result<Duration> {
    humantime::parse_duration(raw.trim())
        .map_err(|e| WpaError::Config(format!("{name} is not a valid duration ('{raw}'): {e}")))
}
