//! Node-Catalog: Node.js distribution catalog for nodepack
//!
//! This crate provides the remote-facing layer of nodepack. It lists the
//! runtime releases published by a distribution server and provisions a
//! chosen release into a layer directory.
//!
//! ## Layer 1 - Distribution
//!
//! The catalog is consumed through the [`VersionCatalog`] trait so the
//! resolver never depends on a concrete transport. In-memory fakes are
//! provided for testing via the [`fakes`] module.

pub mod client;
pub mod entry;
pub mod error;
pub mod fakes;
pub mod runtime;

use async_trait::async_trait;

pub use client::{CatalogConfig, HttpCatalog, DEFAULT_DIST_URL};
pub use entry::{parse_index, CatalogEntry};
pub use error::{CatalogError, CatalogResult};
pub use runtime::{platform_slug, HttpRuntimeInstaller, RuntimeInstall, RuntimeInstaller};

/// Read-only source of installable runtime versions.
///
/// Guarantees:
/// - `list_versions()` returns entries sorted newest first without duplicates.
/// - Repeated calls against an unchanged source return the same list.
#[async_trait]
pub trait VersionCatalog: Send + Sync {
    /// List every available release.
    async fn list_versions(&self) -> CatalogResult<Vec<CatalogEntry>>;
}
