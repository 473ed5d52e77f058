// wpa-net/src/registry.rs
//! Client for the WordPress.org plugin and theme information API.

use std::collections::BTreeMap;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, instrument};
use wpa_common::config::Config;
use wpa_common::error::{Result, WpaError};
use wpa_common::ports::{PackageRegistry, RegistryEntry};
use wpa_common::ArtifactKind;

use crate::http::{build_http_client, map_request_error};
use crate::validation::validate_url;

#[derive(Debug, Deserialize)]
struct InfoResponse {
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    slug: Option<String>,
    #[serde(default)]
    version: Option<String>,
    #[serde(default)]
    download_link: Option<String>,
    /// An object when the package has releases, `[]` or absent otherwise.
    #[serde(default)]
    versions: Value,
}

#[derive(Debug, Clone)]
pub struct WordPressOrgRegistry {
    client: Client,
    api_base_url: String,
}

impl WordPressOrgRegistry {
    pub fn new(config: &Config) -> Result<Self> {
        Ok(Self {
            client: build_http_client(config)?,
            api_base_url: config.api_base_url.trim_end_matches('/').to_string(),
        })
    }

    fn endpoint(&self, kind: ArtifactKind) -> Result<(String, &'static str)> {
        match kind {
            ArtifactKind::Plugin => Ok((
                format!("{}/plugins/info/1.2/", self.api_base_url),
                "plugin_information",
            )),
            ArtifactKind::Theme => Ok((
                format!("{}/themes/info/1.2/", self.api_base_url),
                "theme_information",
            )),
            ArtifactKind::Core => Err(WpaError::ValidationError(
                "core releases are not looked up in the package registry".to_string(),
            )),
        }
    }
}

#[async_trait]
impl PackageRegistry for WordPressOrgRegistry {
    #[instrument(skip(self))]
    async fn lookup(&self, kind: ArtifactKind, slug: &str) -> Result<Option<RegistryEntry>> {
        let (url, action) = self.endpoint(kind)?;
        validate_url(&url)?;
        debug!("Looking up '{}' in registry at {}", slug, url);

        let response = self
            .client
            .get(&url)
            .query(&[
                ("action", action),
                ("request[slug]", slug),
                ("request[fields][versions]", "1"),
            ])
            .send()
            .await
            .map_err(|e| map_request_error(&url, e))?;

        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            debug!("Registry has no {} named '{}'", kind, slug);
            return Ok(None);
        }
        if !status.is_success() {
            return Err(WpaError::HttpStatus(status.as_u16(), url));
        }

        let body = response
            .text()
            .await
            .map_err(|e| map_request_error(&url, e))?;
        parse_info_response(slug, &body)
    }
}

/// Turns an info API body into a registry entry. A literal `null`/`false` body
/// or an `error` field means the slug is unknown.
pub fn parse_info_response(slug: &str, body: &str) -> Result<Option<RegistryEntry>> {
    let value: Value = serde_json::from_str(body)?;
    if value.is_null() || value == Value::Bool(false) {
        return Ok(None);
    }
    let info: InfoResponse = serde_json::from_value(value)?;
    if let Some(err) = info.error {
        debug!("Registry reported '{}' for slug '{}'", err, slug);
        return Ok(None);
    }

    let versions = match info.versions {
        Value::Object(map) => map
            .into_iter()
            .filter(|(version, _)| version != "trunk")
            .map(|(version, link)| (version, link.as_str().map(str::to_string)))
            .collect(),
        _ => BTreeMap::new(),
    };

    Ok(Some(RegistryEntry {
        slug: info.slug.unwrap_or_else(|| slug.to_string()),
        current_version: info.version,
        current_download: info.download_link,
        versions,
    }))
}
