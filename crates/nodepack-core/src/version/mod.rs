//! Runtime version resolution.
//!
//! Turns an override, a manifest range, or nothing at all into exactly one
//! installable version from the catalog.

pub mod range;

use crate::config::BuildConfig;
use crate::error::{BuildError, BuildResult};
use crate::manifest::Manifest;
use node_catalog::{CatalogEntry, VersionCatalog};
use regex::Regex;
use semver::Version;
use serde::{Deserialize, Serialize};
use std::sync::OnceLock;
use tracing::{debug, info};

pub use range::{NodeRange, RangeError};

/// What the build asked for.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum VersionRequest {
    /// No preference: use the current stable release.
    Unspecified,
    /// Exact version from the environment.
    Explicit(String),
    /// Range declared in `engines.node`.
    ManifestRange(String),
}

impl VersionRequest {
    /// Derive the request. An environment override always beats the manifest.
    pub fn from_sources(config: &BuildConfig, manifest: Option<&Manifest>) -> Self {
        if let Some(version) = &config.runtime_version {
            return VersionRequest::Explicit(version.clone());
        }
        match manifest.and_then(Manifest::node_range) {
            Some(range) => VersionRequest::ManifestRange(range.to_string()),
            None => VersionRequest::Unspecified,
        }
    }
}

/// Which request kind produced a [`ResolvedVersion`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VersionSource {
    Override,
    Manifest,
    Default,
}

/// A concrete, validated runtime version.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolvedVersion {
    pub version: Version,
    pub source: VersionSource,
}

impl std::fmt::Display for ResolvedVersion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.version)
    }
}

fn version_shape() -> &'static Regex {
    static SHAPE: OnceLock<Regex> = OnceLock::new();
    SHAPE.get_or_init(|| {
        Regex::new(r"^[0-9]+\.[0-9]+\.[0-9]+(-[0-9A-Za-z.-]+)?$")
            .expect("version shape pattern is valid")
    })
}

/// Check that `input` is `major.minor.patch` with an optional pre-release.
///
/// Surrounding whitespace, missing components and non-numeric tokens are
/// all rejected; nothing is coerced.
pub fn validate_version_shape(input: &str) -> BuildResult<Version> {
    if !version_shape().is_match(input) {
        return Err(BuildError::invalid_version(input));
    }
    Version::parse(input).map_err(|_| BuildError::invalid_version(input))
}

/// Resolves a [`VersionRequest`] against a catalog.
pub struct VersionResolver<'a> {
    catalog: &'a dyn VersionCatalog,
}

impl<'a> VersionResolver<'a> {
    pub fn new(catalog: &'a dyn VersionCatalog) -> Self {
        Self { catalog }
    }

    /// Resolve the request to exactly one version.
    ///
    /// Malformed input fails before the catalog is queried.
    pub async fn resolve(&self, request: &VersionRequest) -> BuildResult<ResolvedVersion> {
        let resolved = match request {
            VersionRequest::Explicit(input) => {
                let wanted = validate_version_shape(input)?;
                let entries = self.catalog.list_versions().await?;
                if !entries.iter().any(|e| e.version == wanted) {
                    return Err(BuildError::version_not_found(format!(
                        "version {:?} (not in the runtime catalog)",
                        input
                    )));
                }
                ResolvedVersion {
                    version: wanted,
                    source: VersionSource::Override,
                }
            }
            VersionRequest::ManifestRange(raw) => {
                let range = NodeRange::parse(raw).map_err(|e| {
                    debug!("Rejecting engines.node range: {}", e);
                    BuildError::invalid_version(raw)
                })?;
                let entries = self.catalog.list_versions().await?;
                let version = highest_matching(&entries, &range).ok_or_else(|| {
                    BuildError::version_not_found(format!("range {:?} from package.json", raw))
                })?;
                ResolvedVersion {
                    version,
                    source: VersionSource::Manifest,
                }
            }
            VersionRequest::Unspecified => {
                let entries = self.catalog.list_versions().await?;
                let version = current_stable(&entries).ok_or_else(|| {
                    BuildError::version_not_found("the default (catalog is empty)")
                })?;
                ResolvedVersion {
                    version,
                    source: VersionSource::Default,
                }
            }
        };

        // Revalidate whatever the catalog handed back
        validate_version_shape(&resolved.version.to_string())?;
        info!(version = %resolved.version, source = ?resolved.source, "Resolved runtime version");
        Ok(resolved)
    }
}

/// Highest catalog version satisfying `range`.
fn highest_matching(entries: &[CatalogEntry], range: &NodeRange) -> Option<Version> {
    entries
        .iter()
        .map(|e| &e.version)
        .filter(|v| range.matches(v))
        .max()
        .cloned()
}

/// Newest LTS release, else newest stable release.
fn current_stable(entries: &[CatalogEntry]) -> Option<Version> {
    let stable = || entries.iter().filter(|e| e.version.pre.is_empty());
    stable()
        .filter(|e| e.is_lts())
        .map(|e| &e.version)
        .max()
        .or_else(|| stable().map(|e| &e.version).max())
        .cloned()
}
