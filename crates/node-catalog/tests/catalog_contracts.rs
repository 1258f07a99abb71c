//! Trait contract tests for VersionCatalog and RuntimeInstaller.
//!
//! These tests verify the behavioral contracts of the catalog traits
//! using in-memory fakes. Any conforming implementation must pass these.

use node_catalog::fakes::{FakeRuntimeInstaller, StaticCatalog};
use node_catalog::{CatalogEntry, CatalogError, RuntimeInstaller, VersionCatalog};
use semver::Version;
use tempfile::tempdir;

// ===========================================================================
// VersionCatalog contract tests
// ===========================================================================

#[tokio::test]
async fn catalog_lists_newest_first() {
    let catalog = StaticCatalog::from_versions(&["14.19.3", "18.12.0", "16.17.1"]);
    let entries = catalog.list_versions().await.unwrap();

    let versions: Vec<String> = entries.iter().map(|e| e.version.to_string()).collect();
    assert_eq!(versions, vec!["18.12.0", "16.17.1", "14.19.3"]);
}

#[tokio::test]
async fn catalog_repeated_queries_are_stable() {
    let catalog = StaticCatalog::new(vec![
        CatalogEntry::new(Version::new(16, 17, 1)).with_lts("Gallium"),
        CatalogEntry::new(Version::new(19, 0, 0)),
    ]);

    let first = catalog.list_versions().await.unwrap();
    let second = catalog.list_versions().await.unwrap();

    assert_eq!(first, second);
    assert_eq!(catalog.query_count(), 2);
}

#[tokio::test]
async fn catalog_unavailable_is_an_error() {
    let catalog = StaticCatalog::unavailable();
    let err = catalog.list_versions().await.unwrap_err();

    assert!(matches!(err, CatalogError::Http(_)));
    assert_eq!(catalog.query_count(), 1);
}

// ===========================================================================
// RuntimeInstaller contract tests
// ===========================================================================

#[tokio::test]
async fn runtime_install_is_idempotent() {
    let dir = tempdir().unwrap();
    let dest = dir.path().join("nodejs");
    let installer = FakeRuntimeInstaller::new();
    let version = Version::new(16, 17, 1);

    let first = installer.install(&version, &dest).await.unwrap();
    let second = installer.install(&version, &dest).await.unwrap();

    assert!(!first.reused);
    assert!(second.reused);
    assert_eq!(installer.installed(), vec![version]);
    assert!(first.bin_dir().is_dir());
}

#[tokio::test]
async fn runtime_install_replaces_other_version() {
    let dir = tempdir().unwrap();
    let dest = dir.path().join("nodejs");
    let installer = FakeRuntimeInstaller::new();

    installer.install(&Version::new(14, 19, 3), &dest).await.unwrap();
    let install = installer.install(&Version::new(16, 17, 1), &dest).await.unwrap();

    assert!(!install.reused);
    assert_eq!(installer.installed().len(), 2);
}
