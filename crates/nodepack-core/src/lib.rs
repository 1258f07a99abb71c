//! Nodepack Core Library
//!
//! Decides, for one Node.js application, which runtime to install, which
//! package manager installs its dependencies, how it starts, and records
//! those decisions as build metadata.

pub mod config;
pub mod devmode;
pub mod entrypoint;
pub mod error;
pub mod fakes;
pub mod installer;
pub mod manifest;
pub mod metadata;
pub mod obs;
pub mod package_manager;
pub mod pipeline;
pub mod telemetry;
pub mod version;

pub use config::BuildConfig;

pub use devmode::{DevModeConfig, SyncRule};

pub use entrypoint::{resolve_entrypoint, EntrypointCommand, EntrypointSource};

pub use error::{BuildError, BuildResult, ErrorKind};

pub use installer::{
    CommandRunner, DependencyInstaller, ExecContext, InstallReport, InstallStep, StepOutput,
    TokioCommandRunner,
};

pub use manifest::Manifest;

pub use metadata::{BomEntry, BuildMetadataRecord, PackageManagerMetadata, RuntimeMetadata};

pub use package_manager::{detect, Detection, InstallPlan, InstallStrategy, PackageManagerKind};

pub use pipeline::{BuildOutcome, BuildPipeline, LaunchProcess};

pub use version::{
    validate_version_shape, ResolvedVersion, VersionRequest, VersionResolver, VersionSource,
};
