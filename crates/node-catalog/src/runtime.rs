//! Runtime provisioning
//!
//! Downloads a prebuilt Node.js archive for the resolved version and unpacks
//! it into a layer directory.

use crate::client::{http_client, CatalogConfig};
use crate::error::CatalogError;
use crate::CatalogResult;
use async_trait::async_trait;
use semver::Version;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tokio::process::Command;
use tracing::{debug, info};

/// Marker file recording which version a layer directory holds
pub const RUNTIME_MARKER: &str = ".nodepack-runtime";

/// An installed runtime
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuntimeInstall {
    /// Installed version
    pub version: Version,
    /// Installation root
    pub home: PathBuf,
    /// Whether an existing installation was reused
    pub reused: bool,
}

impl RuntimeInstall {
    /// Directory holding `node`, `npm` and globally installed tools
    pub fn bin_dir(&self) -> PathBuf {
        self.home.join("bin")
    }
}

/// Provisions a runtime version into a directory
#[async_trait]
pub trait RuntimeInstaller: Send + Sync {
    /// Install `version` into `dest`. Must be a no-op when `dest` already
    /// holds that version.
    async fn install(&self, version: &Version, dest: &Path) -> CatalogResult<RuntimeInstall>;
}

/// Distribution platform slug for the host, e.g. `linux-x64`
pub fn platform_slug() -> CatalogResult<String> {
    platform_slug_for(std::env::consts::OS, std::env::consts::ARCH)
}

fn platform_slug_for(os: &str, arch: &str) -> CatalogResult<String> {
    let os_part = match os {
        "linux" => "linux",
        "macos" => "darwin",
        _ => {
            return Err(CatalogError::UnsupportedPlatform {
                os: os.to_string(),
                arch: arch.to_string(),
            })
        }
    };
    let arch_part = match arch {
        "x86_64" => "x64",
        "aarch64" => "arm64",
        _ => {
            return Err(CatalogError::UnsupportedPlatform {
                os: os.to_string(),
                arch: arch.to_string(),
            })
        }
    };
    Ok(format!("{}-{}", os_part, arch_part))
}

/// Read the version recorded in a layer directory, if any
pub fn installed_version(dest: &Path) -> Option<Version> {
    let marker = std::fs::read_to_string(dest.join(RUNTIME_MARKER)).ok()?;
    Version::parse(marker.trim()).ok()
}

/// Runtime installer downloading archives from the distribution server
pub struct HttpRuntimeInstaller {
    config: CatalogConfig,
    http_client: reqwest::Client,
}

impl HttpRuntimeInstaller {
    /// Create a new installer
    pub fn new(config: CatalogConfig) -> CatalogResult<Self> {
        let http_client = http_client(&config)?;
        Ok(HttpRuntimeInstaller {
            config,
            http_client,
        })
    }

    /// Create installer from environment variables
    pub fn from_env() -> CatalogResult<Self> {
        Self::new(CatalogConfig::from_env())
    }

    async fn download(&self, url: &str, archive: &Path) -> CatalogResult<()> {
        let response = self.http_client.get(url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(CatalogError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }
        let bytes = response.bytes().await?;
        debug!("Downloaded {} bytes from {}", bytes.len(), url);
        tokio::fs::write(archive, &bytes).await?;
        Ok(())
    }

    async fn extract(archive: &Path, dest: &Path) -> CatalogResult<()> {
        let output = Command::new("tar")
            .arg("-xzf")
            .arg(archive)
            .arg("-C")
            .arg(dest)
            .arg("--strip-components=1")
            .output()
            .await
            .map_err(|e| CatalogError::Extract(format!("failed to run tar: {}", e)))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(CatalogError::Extract(stderr.trim().to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl RuntimeInstaller for HttpRuntimeInstaller {
    async fn install(&self, version: &Version, dest: &Path) -> CatalogResult<RuntimeInstall> {
        if installed_version(dest).as_ref() == Some(version) {
            info!("Reusing Node.js {} at {}", version, dest.display());
            return Ok(RuntimeInstall {
                version: version.clone(),
                home: dest.to_path_buf(),
                reused: true,
            });
        }

        // Stale layer: start from an empty directory
        if dest.exists() {
            tokio::fs::remove_dir_all(dest).await?;
        }
        tokio::fs::create_dir_all(dest).await?;

        let url = self.config.archive_url(version, &platform_slug()?);
        info!("Installing Node.js {} from {}", version, url);

        let archive = dest.join(".node-archive.tar.gz");
        self.download(&url, &archive).await?;
        Self::extract(&archive, dest).await?;
        tokio::fs::remove_file(&archive).await?;
        tokio::fs::write(dest.join(RUNTIME_MARKER), version.to_string()).await?;

        Ok(RuntimeInstall {
            version: version.clone(),
            home: dest.to_path_buf(),
            reused: false,
        })
    }
}
