//! Observability tests for the build lifecycle.
//!
//! These tests verify that lifecycle events and the build span can be
//! emitted under a capturing subscriber, including from a full build.

use node_catalog::fakes::{FakeRuntimeInstaller, StaticCatalog};
use nodepack_core::fakes::RecordingRunner;
use nodepack_core::obs::{
    emit_build_failed, emit_build_finished, emit_build_started, emit_install_finished,
    emit_package_manager_detected, emit_version_resolved, new_build_id, BuildSpan,
};
use nodepack_core::{BuildConfig, BuildPipeline};
use tempfile::tempdir;
use tracing_test::traced_test;

/// Test: lifecycle events emit without panicking
#[traced_test]
#[test]
fn test_emit_lifecycle_events() {
    let id = new_build_id();
    emit_build_started(&id, "/workspace", false);
    emit_version_resolved(&id, "16.17.1", "manifest");
    emit_package_manager_detected(&id, "yarn", Some("yarn.lock"));
    emit_package_manager_detected(&id, "npm", None);
    emit_install_finished(&id, "yarn", false, 3);
    emit_build_finished(&id, 1200, 2);

    assert!(logs_contain("build.started"));
    assert!(logs_contain("version.resolved"));
    assert!(logs_contain("package_manager.detected"));
    assert!(logs_contain("install.finished"));
    assert!(logs_contain("build.finished"));
}

/// Test: failures are emitted at warn level
#[traced_test]
#[test]
fn test_emit_build_failed() {
    let error_msg = "invalid Node.js version specified: \"BAD_NEWS_BEARS\"";
    emit_build_failed("build-err-001", "invalid_version_format", &error_msg);

    assert!(logs_contain("build.failed"));
    assert!(logs_contain("invalid_version_format"));
}

/// Test: BuildSpan::enter creates an entered span without panicking
#[traced_test]
#[test]
fn test_build_span_enter() {
    let span = BuildSpan::enter("test-span-build");
    emit_build_started("test-span-build", "/workspace", true);
    drop(span);
}

/// Test: a full build runs under a capturing subscriber
#[traced_test]
#[tokio::test]
async fn test_pipeline_under_subscriber() {
    let catalog = StaticCatalog::from_versions(&["16.17.1"]);
    let runtime = FakeRuntimeInstaller::new();
    let runner = RecordingRunner::new();
    let app = tempdir().unwrap();
    let layers = tempdir().unwrap();
    std::fs::write(app.path().join("package.json"), "{}").unwrap();
    std::fs::write(app.path().join("server.js"), "").unwrap();

    let outcome = BuildPipeline::new(&catalog, &runtime, &runner, BuildConfig::default())
        .run(app.path(), layers.path())
        .await
        .unwrap();

    assert_eq!(outcome.runtime.version.to_string(), "16.17.1");
    assert!(!outcome.build_id.is_empty());
    assert!(logs_contain("build.started"));
    assert!(logs_contain("build.finished"));
}
