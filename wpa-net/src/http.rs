// wpa-net/src/http.rs
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use futures::StreamExt;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, USER_AGENT};
use reqwest::{Client, StatusCode};
use tokio::fs::{self, File as TokioFile};
use tokio::io::AsyncWriteExt;
use tracing::{debug, error, warn};
use wpa_common::config::Config;
use wpa_common::error::{Result, WpaError};
use wpa_common::ports::{ArchiveFetcher, ProgressFn};
use wpa_common::CancelToken;

use crate::validation::validate_url;

const USER_AGENT_STRING: &str = "wpa WordPress analyser (Rust)";

pub fn build_http_client(config: &Config) -> Result<Client> {
    let mut headers = HeaderMap::new();
    headers.insert(USER_AGENT, HeaderValue::from_static(USER_AGENT_STRING));
    headers.insert(ACCEPT, HeaderValue::from_static("*/*"));
    Client::builder()
        .timeout(config.http_timeout)
        .connect_timeout(config.connect_timeout)
        .default_headers(headers)
        .redirect(reqwest::redirect::Policy::limited(10))
        .build()
        .map_err(|e| WpaError::NetworkError(format!("Failed to build HTTP client: {e}")))
}

/// Translates a transport-level reqwest failure into the error taxonomy.
pub(crate) fn map_request_error(url: &str, e: reqwest::Error) -> WpaError {
    if e.is_timeout() {
        WpaError::NetworkError(format!("Request to {url} timed out"))
    } else if e.is_connect() {
        WpaError::NetworkError(format!("Could not connect to {url}: {e}"))
    } else {
        WpaError::from(e)
    }
}

/// Streams archives to disk with reqwest.
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: Client,
}

impl HttpFetcher {
    pub fn new(config: &Config) -> Result<Self> {
        Ok(Self {
            client: build_http_client(config)?,
        })
    }

    pub fn with_client(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl ArchiveFetcher for HttpFetcher {
    async fn fetch(
        &self,
        url: &str,
        dest: &Path,
        progress: &ProgressFn<'_>,
        cancel: &CancelToken,
    ) -> Result<u64> {
        validate_url(url)?;
        let temp_path = temp_path_for(dest);
        if let Some(parent) = dest.parent() {
            fs::create_dir_all(parent).await.map_err(|e| {
                WpaError::Generic(format!(
                    "Failed to create download directory {}: {}",
                    parent.display(),
                    e
                ))
            })?;
        }
        if fs::try_exists(&temp_path).await.unwrap_or(false) {
            if let Err(e) = fs::remove_file(&temp_path).await {
                warn!(
                    "Could not remove stale temporary file {}: {}",
                    temp_path.display(),
                    e
                );
            }
        }

        let result = stream_to_file(&self.client, url, &temp_path, progress, cancel).await;
        match result {
            Ok(bytes) => {
                fs::rename(&temp_path, dest).await.map_err(|e| {
                    WpaError::Generic(format!(
                        "Failed to move temp file {} to {}: {}",
                        temp_path.display(),
                        dest.display(),
                        e
                    ))
                })?;
                debug!("Downloaded {} bytes from {} to {}", bytes, url, dest.display());
                Ok(bytes)
            }
            Err(e) => {
                if let Err(remove_err) = fs::remove_file(&temp_path).await {
                    if remove_err.kind() != std::io::ErrorKind::NotFound {
                        warn!(
                            "Failed to discard partial download {}: {}",
                            temp_path.display(),
                            remove_err
                        );
                    }
                }
                Err(e)
            }
        }
    }
}

fn temp_path_for(dest: &Path) -> PathBuf {
    let name = dest
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| "archive".to_string());
    dest.with_file_name(format!(".{name}.download"))
}

async fn stream_to_file(
    client: &Client,
    url: &str,
    temp_path: &Path,
    progress: &ProgressFn<'_>,
    cancel: &CancelToken,
) -> Result<u64> {
    let response = tokio::select! {
        res = client.get(url).send() => res.map_err(|e| map_request_error(url, e))?,
        _ = cancel.cancelled() => return Err(WpaError::Cancelled),
    };
    let status = response.status();
    debug!("Received HTTP status: {} for {}", status, url);

    if !status.is_success() {
        return Err(match status {
            StatusCode::NOT_FOUND => WpaError::NotFound(url.to_string()),
            _ => {
                error!("HTTP error {} for URL {}", status, url);
                WpaError::HttpStatus(status.as_u16(), url.to_string())
            }
        });
    }

    let total = response.content_length();
    let mut file = TokioFile::create(temp_path).await.map_err(|e| {
        WpaError::Generic(format!(
            "Failed to create temp file {}: {}",
            temp_path.display(),
            e
        ))
    })?;

    let mut received: u64 = 0;
    progress(received, total);
    let mut stream = response.bytes_stream();
    loop {
        let chunk = tokio::select! {
            next = stream.next() => next,
            _ = cancel.cancelled() => {
                debug!("Download of {} cancelled after {} bytes", url, received);
                return Err(WpaError::Cancelled);
            }
        };
        let Some(chunk) = chunk else { break };
        let chunk = chunk.map_err(|e| {
            WpaError::NetworkError(format!("Failed to read response body from {url}: {e}"))
        })?;
        file.write_all(&chunk).await?;
        received += chunk.len() as u64;
        progress(received, total);
    }
    file.flush().await?;
    Ok(received)
}
