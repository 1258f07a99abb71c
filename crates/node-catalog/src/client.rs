//! Distribution catalog client
//!
//! Fetches the release index published alongside the Node.js binaries.

use crate::entry::{parse_index, CatalogEntry};
use crate::error::CatalogError;
use crate::{CatalogResult, VersionCatalog};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, info};

/// Default distribution server
pub const DEFAULT_DIST_URL: &str = "https://nodejs.org/dist";

/// Catalog configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CatalogConfig {
    /// Base URL of the distribution server (no trailing slash)
    pub dist_url: String,
    /// Request timeout in seconds
    pub timeout_secs: u64,
}

impl Default for CatalogConfig {
    fn default() -> Self {
        CatalogConfig {
            dist_url: std::env::var("NODEPACK_DIST_URL")
                .ok()
                .filter(|v| !v.is_empty())
                .unwrap_or_else(|| DEFAULT_DIST_URL.to_string()),
            timeout_secs: std::env::var("NODEPACK_HTTP_TIMEOUT_SECS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(30),
        }
    }
}

impl CatalogConfig {
    /// Create a new config from environment variables
    pub fn from_env() -> Self {
        Self::default()
    }

    /// Create config for a specific server
    pub fn new(dist_url: &str) -> Self {
        CatalogConfig {
            dist_url: dist_url.trim_end_matches('/').to_string(),
            timeout_secs: 30,
        }
    }

    /// URL of the release index
    pub fn index_url(&self) -> String {
        format!("{}/index.json", self.dist_url.trim_end_matches('/'))
    }

    /// URL of the runtime archive for `version` on `platform`
    pub fn archive_url(&self, version: &semver::Version, platform: &str) -> String {
        format!(
            "{}/v{}/node-v{}-{}.tar.gz",
            self.dist_url.trim_end_matches('/'),
            version,
            version,
            platform
        )
    }
}

/// Build the shared HTTP client
pub(crate) fn http_client(config: &CatalogConfig) -> CatalogResult<reqwest::Client> {
    let client = reqwest::Client::builder()
        .user_agent(concat!("nodepack/", env!("CARGO_PKG_VERSION")))
        .timeout(Duration::from_secs(config.timeout_secs))
        .build()?;
    Ok(client)
}

/// Catalog backed by the distribution server's `index.json`
pub struct HttpCatalog {
    config: CatalogConfig,
    http_client: reqwest::Client,
}

impl HttpCatalog {
    /// Create a new catalog client
    pub fn new(config: CatalogConfig) -> CatalogResult<Self> {
        let http_client = http_client(&config)?;
        Ok(HttpCatalog {
            config,
            http_client,
        })
    }

    /// Create client from environment variables
    pub fn from_env() -> CatalogResult<Self> {
        Self::new(CatalogConfig::from_env())
    }

    /// Configuration in use
    pub fn config(&self) -> &CatalogConfig {
        &self.config
    }
}

#[async_trait]
impl VersionCatalog for HttpCatalog {
    async fn list_versions(&self) -> CatalogResult<Vec<CatalogEntry>> {
        let url = self.config.index_url();
        info!("Fetching runtime catalog from {}", url);

        let response = self.http_client.get(&url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(CatalogError::Status {
                url,
                status: status.as_u16(),
            });
        }

        let body = response.text().await?;
        let entries = parse_index(&body)?;
        debug!("Catalog lists {} releases", entries.len());
        Ok(entries)
    }
}
