//! Build error taxonomy for nodepack.
//!
//! Every variant is terminal for the current build. Messages carry a stable
//! prefix so callers can match on the failure kind from text alone.

use node_catalog::CatalogError;
use std::path::PathBuf;

/// Display name of the runtime used in user-facing messages.
pub const RUNTIME_DISPLAY_NAME: &str = "Node.js";

/// Stable discriminant of a [`BuildError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    InvalidVersionFormat,
    VersionNotFound,
    AmbiguousPackageManager,
    MissingEntrypoint,
    InstallFailure,
    InvalidManifest,
    Catalog,
    Io,
}

impl ErrorKind {
    /// Snake-case name used in log events.
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::InvalidVersionFormat => "invalid_version_format",
            ErrorKind::VersionNotFound => "version_not_found",
            ErrorKind::AmbiguousPackageManager => "ambiguous_package_manager",
            ErrorKind::MissingEntrypoint => "missing_entrypoint",
            ErrorKind::InstallFailure => "install_failure",
            ErrorKind::InvalidManifest => "invalid_manifest",
            ErrorKind::Catalog => "catalog",
            ErrorKind::Io => "io",
        }
    }
}

/// Errors that abort a build.
#[derive(Debug, thiserror::Error)]
pub enum BuildError {
    #[error("invalid {runtime} version specified: {input:?}")]
    InvalidVersionFormat { runtime: &'static str, input: String },

    #[error("no {runtime} version satisfies {request}")]
    VersionNotFound { runtime: &'static str, request: String },

    #[error("ambiguous package manager: detected {}", found.join(", "))]
    AmbiguousPackageManager { found: Vec<String> },

    #[error("missing entrypoint: {0}")]
    MissingEntrypoint(String),

    #[error("install failed: `{command}` exited with code {exit_code}: {stderr}")]
    InstallFailure {
        command: String,
        exit_code: i32,
        stderr: String,
    },

    #[error("invalid manifest {path}: {reason}")]
    InvalidManifest { path: PathBuf, reason: String },

    #[error("runtime catalog error: {0}")]
    Catalog(#[from] CatalogError),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl BuildError {
    pub(crate) fn invalid_version(input: &str) -> Self {
        BuildError::InvalidVersionFormat {
            runtime: RUNTIME_DISPLAY_NAME,
            input: input.to_string(),
        }
    }

    pub(crate) fn version_not_found(request: impl Into<String>) -> Self {
        BuildError::VersionNotFound {
            runtime: RUNTIME_DISPLAY_NAME,
            request: request.into(),
        }
    }

    /// Stable kind of this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            BuildError::InvalidVersionFormat { .. } => ErrorKind::InvalidVersionFormat,
            BuildError::VersionNotFound { .. } => ErrorKind::VersionNotFound,
            BuildError::AmbiguousPackageManager { .. } => ErrorKind::AmbiguousPackageManager,
            BuildError::MissingEntrypoint(_) => ErrorKind::MissingEntrypoint,
            BuildError::InstallFailure { .. } => ErrorKind::InstallFailure,
            BuildError::InvalidManifest { .. } => ErrorKind::InvalidManifest,
            BuildError::Catalog(_) => ErrorKind::Catalog,
            BuildError::Io(_) => ErrorKind::Io,
        }
    }
}

/// Result type for build operations.
pub type BuildResult<T> = std::result::Result<T, BuildError>;
