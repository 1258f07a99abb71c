//! In-memory fakes for catalog traits (testing only)
//!
//! Provides `StaticCatalog` and `FakeRuntimeInstaller` that satisfy the trait
//! contracts without network access.

use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use semver::Version;

use crate::entry::{sort_newest_first, CatalogEntry};
use crate::error::CatalogError;
use crate::runtime::{installed_version, RuntimeInstall, RuntimeInstaller, RUNTIME_MARKER};
use crate::{CatalogResult, VersionCatalog};

// ---------------------------------------------------------------------------
// StaticCatalog
// ---------------------------------------------------------------------------

/// Fixed in-memory catalog that counts how often it was queried.
#[derive(Debug, Default)]
pub struct StaticCatalog {
    entries: Vec<CatalogEntry>,
    unavailable: bool,
    queries: AtomicUsize,
}

impl StaticCatalog {
    pub fn new(mut entries: Vec<CatalogEntry>) -> Self {
        sort_newest_first(&mut entries);
        StaticCatalog {
            entries,
            unavailable: false,
            queries: AtomicUsize::new(0),
        }
    }

    /// Catalog of plain (non-LTS) versions, e.g. `["16.17.1", "18.12.0"]`.
    ///
    /// Panics on unparsable versions.
    pub fn from_versions(versions: &[&str]) -> Self {
        Self::new(
            versions
                .iter()
                .map(|v| CatalogEntry::new(Version::parse(v).unwrap()))
                .collect(),
        )
    }

    /// Catalog whose every query fails, simulating an unreachable server.
    pub fn unavailable() -> Self {
        StaticCatalog {
            unavailable: true,
            ..Self::default()
        }
    }

    /// Number of `list_versions` calls so far.
    pub fn query_count(&self) -> usize {
        self.queries.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl VersionCatalog for StaticCatalog {
    async fn list_versions(&self) -> CatalogResult<Vec<CatalogEntry>> {
        self.queries.fetch_add(1, Ordering::SeqCst);
        if self.unavailable {
            return Err(CatalogError::Http("catalog unavailable".to_string()));
        }
        Ok(self.entries.clone())
    }
}

// ---------------------------------------------------------------------------
// FakeRuntimeInstaller
// ---------------------------------------------------------------------------

/// Runtime installer that only writes the layer marker and an empty `bin`.
#[derive(Debug, Default)]
pub struct FakeRuntimeInstaller {
    installs: Mutex<Vec<Version>>,
}

impl FakeRuntimeInstaller {
    pub fn new() -> Self {
        Self::default()
    }

    /// Versions actually provisioned (reuses are not recorded).
    pub fn installed(&self) -> Vec<Version> {
        self.installs.lock().unwrap().clone()
    }
}

#[async_trait]
impl RuntimeInstaller for FakeRuntimeInstaller {
    async fn install(&self, version: &Version, dest: &Path) -> CatalogResult<RuntimeInstall> {
        if installed_version(dest).as_ref() == Some(version) {
            return Ok(RuntimeInstall {
                version: version.clone(),
                home: dest.to_path_buf(),
                reused: true,
            });
        }

        std::fs::create_dir_all(dest.join("bin"))?;
        std::fs::write(dest.join(RUNTIME_MARKER), version.to_string())?;
        self.installs.lock().unwrap().push(version.clone());

        Ok(RuntimeInstall {
            version: version.clone(),
            home: dest.to_path_buf(),
            reused: false,
        })
    }
}
