use std::path::PathBuf;
use std::sync::Arc;

use thiserror::Error;

#[derive(Error, Debug, Clone)]
pub enum WpaError {
    #[error("I/O Error: {0}")]
    Io(#[from] Arc<std::io::Error>),

    #[error("HTTP Request Error: {0}")]
    Http(#[from] Arc<reqwest::Error>),

    #[error("JSON Parsing Error: {0}")]
    Json(#[from] Arc<serde_json::Error>),

    #[error("Configuration Error: {0}")]
    Config(String),

    #[error("Could not find WordPress in {}", .0.display())]
    NotWordPress(PathBuf),

    #[error("Could not detect WordPress version in {}", .0.display())]
    VersionNotFound(PathBuf),

    #[error("Scratch directory {} is unavailable: {}", .0.display(), .1)]
    ScratchDirConflict(PathBuf, String),

    #[error("Failed to walk tree at {}: {message}", path.display())]
    TreeWalkError { path: PathBuf, message: String },

    #[error("Resource Not Found: {0}")]
    NotFound(String),

    #[error("Network Error: {0}")]
    NetworkError(String),

    #[error("HTTP status {0} for {1}")]
    HttpStatus(u16, String),

    #[error("Corrupt archive: {0}")]
    CorruptArchive(String),

    #[error("Validation Error: {0}")]
    ValidationError(String),

    #[error("Operation cancelled")]
    Cancelled,

    #[error("Generic Error: {0}")]
    Generic(String),
}

impl WpaError {
    /// Whether a registry or download request failing with this error is worth retrying.
    pub fn is_transient(&self) -> bool {
        match self {
            WpaError::NetworkError(_) => true,
            WpaError::Http(e) => e.is_timeout() || e.is_connect() || e.is_request(),
            WpaError::HttpStatus(status, _) => *status == 429 || *status >= 500,
            _ => false,
        }
    }

    pub fn tree_walk(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        WpaError::TreeWalkError {
            path: path.into(),
            message: message.into(),
        }
    }
}

impl From<std::io::Error> for WpaError {
    fn from(err: std::io::Error) -> Self {
        WpaError::Io(Arc::new(err))
    }
}

impl From<reqwest::Error> for WpaError {
    fn from(err: reqwest::Error) -> Self {
        WpaError::Http(Arc::new(err))
    }
}

impl From<serde_json::Error> for WpaError {
    fn from(err: serde_json::Error) -> Self {
        WpaError::Json(Arc::new(err))
    }
}

pub type Result<T> = std::result::Result<T, WpaError>;
