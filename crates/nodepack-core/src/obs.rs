//! Structured observability hooks for the build lifecycle.
//!
//! This module provides:
//! - Build-scoped tracing spans via the `BuildSpan` RAII guard
//! - Emission functions for lifecycle events: start, version, package manager, install, finish
//!
//! Events are emitted at `info!` level (filter with `NODEPACK_LOG`).
//! For JSON output, set `NODEPACK_LOG_FORMAT=json`.

use tracing::info;

/// RAII guard that enters a build-scoped tracing span.
///
/// # Example
///
/// ```ignore
/// let _span = BuildSpan::enter("5f1c...");
/// // every event below carries build_id
/// ```
pub struct BuildSpan {
    _span: tracing::span::EnteredSpan,
}

impl BuildSpan {
    /// Create and enter a span tagged with the build id.
    pub fn enter(build_id: &str) -> Self {
        Self {
            _span: build_span(build_id).entered(),
        }
    }
}

/// Build-scoped span, for instrumenting futures that cross await points.
pub fn build_span(build_id: &str) -> tracing::Span {
    tracing::info_span!("nodepack.build", build_id = %build_id)
}

/// Fresh build id.
pub fn new_build_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

/// Emit event: build started for an application directory.
pub fn emit_build_started(build_id: &str, app_dir: &str, devmode: bool) {
    info!(event = "build.started", build_id = %build_id, app_dir = %app_dir, devmode = devmode);
}

/// Emit event: runtime version chosen.
pub fn emit_version_resolved(build_id: &str, version: &str, source: &str) {
    info!(event = "version.resolved", build_id = %build_id, version = %version, source = %source);
}

/// Emit event: package manager detected.
pub fn emit_package_manager_detected(build_id: &str, manager: &str, lockfile: Option<&str>) {
    info!(
        event = "package_manager.detected",
        build_id = %build_id,
        manager = %manager,
        lockfile = lockfile.unwrap_or("none"),
    );
}

/// Emit event: dependency install completed.
pub fn emit_install_finished(build_id: &str, manager: &str, skipped: bool, steps: usize) {
    info!(
        event = "install.finished",
        build_id = %build_id,
        manager = %manager,
        skipped = skipped,
        steps = steps,
    );
}

/// Emit event: build finished with duration and BOM size.
pub fn emit_build_finished(build_id: &str, duration_ms: u64, bom_entries: usize) {
    info!(
        event = "build.finished",
        build_id = %build_id,
        duration_ms = duration_ms,
        bom_entries = bom_entries,
    );
}

/// Emit event: build failed (warning level).
pub fn emit_build_failed(build_id: &str, kind: &str, error: &dyn std::fmt::Display) {
    tracing::warn!(event = "build.failed", build_id = %build_id, kind = %kind, error = %error);
}
