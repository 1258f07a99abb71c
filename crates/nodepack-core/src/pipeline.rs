//! Build orchestration.
//!
//! Runs every component in order for one application and returns the
//! metadata record plus the launch process. The first failure aborts the
//! build and nothing is emitted.

use crate::config::BuildConfig;
use crate::devmode::{self, DevModeConfig};
use crate::entrypoint::{resolve_entrypoint, EntrypointCommand, EntrypointSource};
use crate::error::{BuildError, BuildResult};
use crate::installer::{
    CommandRunner, DependencyInstaller, ExecContext, InstallReport, InstallStep,
};
use crate::manifest::Manifest;
use crate::metadata::{BomEntry, BuildMetadataRecord};
use crate::obs;
use crate::package_manager::{self, InstallPlan};
use crate::version::{ResolvedVersion, VersionRequest, VersionResolver, VersionSource};
use node_catalog::{RuntimeInstaller, VersionCatalog};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{debug, info, Instrument};

/// Layer directory the runtime is installed into, under the layers root.
pub const RUNTIME_LAYER: &str = "nodejs";

const SHELL_METACHARACTERS: [&str; 9] = ["&&", "||", "|", ";", ">", "<", "$", "`", "*"];

/// Process started when the image runs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LaunchProcess {
    /// Program and arguments; a single shell string when `direct` is false.
    pub command: Vec<String>,
    /// Whether the command is executed without a shell.
    pub direct: bool,
}

impl LaunchProcess {
    fn for_entrypoint(entrypoint: &EntrypointCommand, devmode: Option<&DevModeConfig>) -> Self {
        if let Some(config) = devmode {
            return LaunchProcess {
                command: config.watch_command(entrypoint),
                direct: true,
            };
        }
        if entrypoint.source == EntrypointSource::Override && needs_shell(&entrypoint.raw) {
            return LaunchProcess {
                command: vec![entrypoint.raw.clone()],
                direct: false,
            };
        }
        LaunchProcess {
            command: entrypoint.tokens.clone(),
            direct: true,
        }
    }
}

fn needs_shell(raw: &str) -> bool {
    SHELL_METACHARACTERS.iter().any(|m| raw.contains(m))
}

/// Result of a successful build.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildOutcome {
    pub build_id: String,
    pub runtime: ResolvedVersion,
    pub record: BuildMetadataRecord,
    pub launch: LaunchProcess,
    /// Absent when nothing was installed.
    pub install: Option<InstallReport>,
}

impl BuildOutcome {
    pub fn bom(&self) -> Vec<BomEntry> {
        self.record.to_bom()
    }

    /// Document written by the CLI: `{ "bom": [...], "launch": {...} }`.
    pub fn to_json(&self) -> serde_json::Value {
        json!({
            "bom": self.bom(),
            "launch": self.launch,
        })
    }
}

/// Build pipeline over injected capabilities.
pub struct BuildPipeline<'a> {
    catalog: &'a dyn VersionCatalog,
    runtime: &'a dyn RuntimeInstaller,
    runner: &'a dyn CommandRunner,
    config: BuildConfig,
    skip_install: bool,
}

impl<'a> BuildPipeline<'a> {
    pub fn new(
        catalog: &'a dyn VersionCatalog,
        runtime: &'a dyn RuntimeInstaller,
        runner: &'a dyn CommandRunner,
        config: BuildConfig,
    ) -> Self {
        Self {
            catalog,
            runtime,
            runner,
            config,
            skip_install: false,
        }
    }

    /// Resolve everything but provision nothing: no runtime download, no
    /// dependency install.
    pub fn with_skip_install(mut self, skip: bool) -> Self {
        self.skip_install = skip;
        self
    }

    pub fn config(&self) -> &BuildConfig {
        &self.config
    }

    /// Build the application in `app_dir`, installing into `layers_dir`.
    pub async fn run(&self, app_dir: &Path, layers_dir: &Path) -> BuildResult<BuildOutcome> {
        let build_id = obs::new_build_id();
        let start = Instant::now();

        obs::emit_build_started(
            &build_id,
            &app_dir.display().to_string(),
            self.config.devmode,
        );

        let result = self
            .execute(&build_id, app_dir, layers_dir)
            .instrument(obs::build_span(&build_id))
            .await;
        match result {
            Ok(outcome) => {
                obs::emit_build_finished(
                    &build_id,
                    start.elapsed().as_millis() as u64,
                    outcome.bom().len(),
                );
                Ok(outcome)
            }
            Err(e) => {
                obs::emit_build_failed(&build_id, e.kind().as_str(), &e);
                Err(e)
            }
        }
    }

    async fn execute(
        &self,
        build_id: &str,
        app_dir: &Path,
        layers_dir: &Path,
    ) -> BuildResult<BuildOutcome> {
        let manifest = Manifest::load(app_dir)?;

        // Version
        let request = VersionRequest::from_sources(&self.config, manifest.as_ref());
        let resolved = VersionResolver::new(self.catalog).resolve(&request).await?;
        obs::emit_version_resolved(
            build_id,
            &resolved.version.to_string(),
            source_name(resolved.source),
        );

        // Package manager
        let detection = package_manager::detect(
            app_dir,
            manifest.as_ref(),
            self.config.entrypoint.is_some(),
        )?;
        match &detection {
            Some(d) => obs::emit_package_manager_detected(
                build_id,
                d.kind.name(),
                d.lockfile.as_deref(),
            ),
            None => debug!("No package manager; runtime only"),
        }

        // Entrypoint and dev mode
        let entrypoint = resolve_entrypoint(
            self.config.entrypoint.as_deref(),
            manifest.as_ref(),
            detection.as_ref().map(|d| d.kind),
            app_dir,
        )?;
        info!(command = %entrypoint.raw, source = ?entrypoint.source, "Entrypoint resolved");
        let devmode = devmode::configure(self.config.devmode, &entrypoint);

        let plan = detection
            .as_ref()
            .map(|d| InstallPlan::new(d, self.config.devmode));

        // Provisioning
        let mut report = None;
        if self.skip_install {
            info!("Skipping runtime and dependency installation");
        } else {
            let runtime_home = layers_dir.join(RUNTIME_LAYER);
            let runtime = self.runtime.install(&resolved.version, &runtime_home).await?;
            info!(
                version = %runtime.version,
                home = %runtime.home.display(),
                reused = runtime.reused,
                "Runtime ready"
            );
            let bin_dir = runtime.bin_dir();

            if let (Some(plan), Some(manifest)) = (&plan, &manifest) {
                let installer =
                    DependencyInstaller::new(self.runner, self.config.install_timeout_secs);
                let installed = installer
                    .install(plan, app_dir, manifest, &resolved.version, Some(&bin_dir))
                    .await?;
                obs::emit_install_finished(
                    build_id,
                    installed.kind.name(),
                    installed.skipped,
                    installed.steps.len(),
                );
                report = Some(installed);
            }

            if devmode.is_some() {
                self.install_dev_tools(app_dir, &bin_dir).await?;
            }
        }

        let launch = LaunchProcess::for_entrypoint(&entrypoint, devmode.as_ref());
        let record = BuildMetadataRecord::emit(
            &resolved,
            plan.as_ref().map(|p| (p, report.as_ref())),
            devmode,
            &entrypoint,
        );

        Ok(BuildOutcome {
            build_id: build_id.to_string(),
            runtime: resolved,
            record,
            launch,
            install: report,
        })
    }

    async fn install_dev_tools(&self, app_dir: &Path, bin_dir: &Path) -> BuildResult<()> {
        let step = InstallStep::new(
            "devmode_tools",
            DevModeConfig::tool_install_command(),
            self.config.install_timeout_secs,
        );
        let ctx = ExecContext {
            cwd: app_dir.to_path_buf(),
            bin_dir: Some(PathBuf::from(bin_dir)),
        };
        info!(command = %step.display(), "Installing dev mode tools");
        let output = self.runner.run(&step, &ctx).await?;
        if !output.passed() {
            return Err(BuildError::InstallFailure {
                command: step.display(),
                exit_code: output.exit_code,
                stderr: output.stderr.trim().to_string(),
            });
        }
        Ok(())
    }
}

fn source_name(source: VersionSource) -> &'static str {
    match source {
        VersionSource::Override => "override",
        VersionSource::Manifest => "manifest",
        VersionSource::Default => "default",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(raw: &str, source: EntrypointSource) -> EntrypointCommand {
        EntrypointCommand {
            tokens: shlex::split(raw).unwrap(),
            raw: raw.to_string(),
            source,
            script_file: None,
        }
    }

    #[test]
    fn test_launch_direct_for_plain_command() {
        let launch =
            LaunchProcess::for_entrypoint(&entry("node server.js", EntrypointSource::Override), None);
        assert!(launch.direct);
        assert_eq!(launch.command, vec!["node", "server.js"]);
    }

    #[test]
    fn test_launch_shell_for_compound_override() {
        let raw = "node migrate.js && node server.js";
        let launch = LaunchProcess::for_entrypoint(&entry(raw, EntrypointSource::Override), None);
        assert!(!launch.direct);
        assert_eq!(launch.command, vec![raw]);
    }

    #[test]
    fn test_launch_devmode_wraps_watcher() {
        let e = entry("npm start", EntrypointSource::StartScript);
        let config = DevModeConfig::new(&e);
        let launch = LaunchProcess::for_entrypoint(&e, Some(&config));
        assert_eq!(launch.command[0], "nodemon");
        assert_eq!(launch.command.last().map(String::as_str), Some("npm start"));
    }
}
