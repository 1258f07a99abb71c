//! Dependency installation.
//!
//! Runs the steps of an [`InstallPlan`] through a [`CommandRunner`] and
//! records an install digest so unchanged inputs skip the work on rebuilds.

use crate::error::{BuildError, BuildResult};
use crate::manifest::Manifest;
use crate::package_manager::{InstallPlan, PackageManagerKind};
use async_trait::async_trait;
use semver::Version;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::{Duration, Instant};
use tokio::fs;
use tokio::process::Command;
use tracing::{debug, info, warn};

/// Install stamp, relative to the application directory.
pub const INSTALL_STAMP: &str = "node_modules/.nodepack-install";

/// A single command to execute.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstallStep {
    /// Human-readable step name.
    pub name: String,

    /// Command to execute (first element is executable).
    pub command: Vec<String>,

    /// Timeout in seconds (0 = none).
    pub timeout_secs: u64,
}

impl InstallStep {
    pub fn new(name: &str, command: Vec<String>, timeout_secs: u64) -> Self {
        Self {
            name: name.to_string(),
            command,
            timeout_secs,
        }
    }

    /// Command as a single display string.
    pub fn display(&self) -> String {
        self.command.join(" ")
    }
}

/// Where a step runs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecContext {
    pub cwd: PathBuf,
    /// Prepended to `PATH` when set.
    pub bin_dir: Option<PathBuf>,
}

/// Result of a step execution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepOutput {
    /// Step name.
    pub step_name: String,

    /// Exit code (0 = success).
    pub exit_code: i32,

    /// Captured stdout.
    pub stdout: String,

    /// Captured stderr.
    pub stderr: String,

    /// Duration in milliseconds.
    pub duration_ms: u64,

    /// Whether execution succeeded.
    pub success: bool,
}

impl StepOutput {
    /// Whether this step passed (exit code 0).
    pub fn passed(&self) -> bool {
        self.success && self.exit_code == 0
    }
}

/// Executes install steps.
#[async_trait]
pub trait CommandRunner: Send + Sync {
    /// Run one step. A step that ran and exited non-zero is an `Ok` output;
    /// only failures to run at all are errors.
    async fn run(&self, step: &InstallStep, ctx: &ExecContext) -> BuildResult<StepOutput>;
}

/// Runner spawning real processes with `tokio::process`.
#[derive(Debug, Default, Clone)]
pub struct TokioCommandRunner;

impl TokioCommandRunner {
    fn path_with(bin_dir: &Path) -> Option<std::ffi::OsString> {
        let mut paths = vec![bin_dir.to_path_buf()];
        if let Some(existing) = std::env::var_os("PATH") {
            paths.extend(std::env::split_paths(&existing));
        }
        std::env::join_paths(paths).ok()
    }
}

#[async_trait]
impl CommandRunner for TokioCommandRunner {
    async fn run(&self, step: &InstallStep, ctx: &ExecContext) -> BuildResult<StepOutput> {
        let start = Instant::now();

        let Some((exe, args)) = step.command.split_first() else {
            return Err(spawn_failure(step, "empty command"));
        };

        let mut cmd = Command::new(exe);
        cmd.args(args)
            .current_dir(&ctx.cwd)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        if let Some(path) = ctx.bin_dir.as_deref().and_then(Self::path_with) {
            cmd.env("PATH", path);
        }

        let child = cmd
            .spawn()
            .map_err(|e| spawn_failure(step, &e.to_string()))?;

        let output = if step.timeout_secs > 0 {
            tokio::time::timeout(
                Duration::from_secs(step.timeout_secs),
                child.wait_with_output(),
            )
            .await
            .map_err(|_| {
                spawn_failure(
                    step,
                    &format!("timed out after {} seconds", step.timeout_secs),
                )
            })??
        } else {
            child.wait_with_output().await?
        };

        Ok(StepOutput {
            step_name: step.name.clone(),
            exit_code: output.status.code().unwrap_or(-1),
            stdout: String::from_utf8_lossy(&output.stdout).to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).to_string(),
            duration_ms: start.elapsed().as_millis() as u64,
            success: output.status.success(),
        })
    }
}

fn spawn_failure(step: &InstallStep, reason: &str) -> BuildError {
    BuildError::InstallFailure {
        command: step.display(),
        exit_code: -1,
        stderr: reason.to_string(),
    }
}

/// Outcome of a dependency install.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstallReport {
    pub kind: PackageManagerKind,
    /// Version reported by the manager, or its pin when the probe failed.
    pub manager_version: Option<String>,
    /// True when the install stamp matched and nothing ran.
    pub skipped: bool,
    pub steps: Vec<StepOutput>,
}

#[derive(Debug, Serialize, Deserialize)]
struct InstallStamp {
    digest: String,
    manager_version: Option<String>,
}

/// Digest over everything that influences the installed tree.
pub fn install_digest(
    plan: &InstallPlan,
    manifest: &Manifest,
    lockfile: Option<&[u8]>,
    runtime: &Version,
) -> String {
    let mut hasher = Sha256::new();
    hasher.update(&manifest.raw);
    hasher.update(b"\0");
    hasher.update(lockfile.unwrap_or_default());
    hasher.update(b"\0");
    hasher.update(runtime.to_string().as_bytes());
    hasher.update(b"\0");
    for step in plan.prepare.iter().chain(std::iter::once(&plan.command)) {
        for arg in step {
            hasher.update(arg.as_bytes());
            hasher.update(b"\0");
        }
        hasher.update(b"\n");
    }
    hex::encode(hasher.finalize())
}

/// Runs an install plan.
pub struct DependencyInstaller<'a> {
    runner: &'a dyn CommandRunner,
    timeout_secs: u64,
}

impl<'a> DependencyInstaller<'a> {
    pub fn new(runner: &'a dyn CommandRunner, timeout_secs: u64) -> Self {
        Self {
            runner,
            timeout_secs,
        }
    }

    /// Install dependencies for the application in `app_dir`.
    pub async fn install(
        &self,
        plan: &InstallPlan,
        app_dir: &Path,
        manifest: &Manifest,
        runtime: &Version,
        bin_dir: Option<&Path>,
    ) -> BuildResult<InstallReport> {
        let lockfile = match &plan.lockfile {
            Some(name) => Some(fs::read(app_dir.join(name)).await?),
            None => None,
        };
        let digest = install_digest(plan, manifest, lockfile.as_deref(), runtime);
        let stamp_path = app_dir.join(INSTALL_STAMP);

        if let Some(stamp) = read_stamp(&stamp_path).await {
            if stamp.digest == digest {
                info!(manager = %plan.kind, "Dependencies unchanged; skipping install");
                return Ok(InstallReport {
                    kind: plan.kind,
                    manager_version: stamp.manager_version,
                    skipped: true,
                    steps: vec![],
                });
            }
            debug!("Install stamp is stale");
        }

        let ctx = ExecContext {
            cwd: app_dir.to_path_buf(),
            bin_dir: bin_dir.map(Path::to_path_buf),
        };

        let mut steps = Vec::new();
        for (i, command) in plan.prepare.iter().enumerate() {
            let step = InstallStep::new(&format!("prepare_{}", i + 1), command.clone(), self.timeout_secs);
            steps.push(self.run_checked(&step, &ctx).await?);
        }
        let step = InstallStep::new("install", plan.command.clone(), self.timeout_secs);
        steps.push(self.run_checked(&step, &ctx).await?);

        let manager_version = self.probe_version(plan, &ctx).await;

        let stamp = InstallStamp {
            digest,
            manager_version: manager_version.clone(),
        };
        if let Some(parent) = stamp_path.parent() {
            fs::create_dir_all(parent).await?;
        }
        fs::write(
            &stamp_path,
            serde_json::to_vec(&stamp).map_err(std::io::Error::from)?,
        )
        .await?;

        Ok(InstallReport {
            kind: plan.kind,
            manager_version,
            skipped: false,
            steps,
        })
    }

    async fn run_checked(&self, step: &InstallStep, ctx: &ExecContext) -> BuildResult<StepOutput> {
        info!(step = %step.name, command = %step.display(), "Running install step");
        let output = self.runner.run(step, ctx).await?;
        if !output.passed() {
            return Err(BuildError::InstallFailure {
                command: step.display(),
                exit_code: output.exit_code,
                stderr: output.stderr.trim().to_string(),
            });
        }
        Ok(output)
    }

    async fn probe_version(&self, plan: &InstallPlan, ctx: &ExecContext) -> Option<String> {
        let step = InstallStep::new("version_probe", plan.version_probe(), self.timeout_secs);
        match self.runner.run(&step, ctx).await {
            Ok(output) if output.passed() => {
                let version = output
                    .stdout
                    .lines()
                    .map(str::trim)
                    .filter(|l| !l.is_empty())
                    .last()
                    .map(str::to_string);
                if let Some(v) = &version {
                    info!("{}: {}", step.display(), v);
                }
                version.or_else(|| plan.pinned_version.clone())
            }
            Ok(output) => {
                warn!(exit_code = output.exit_code, "{} failed", step.display());
                plan.pinned_version.clone()
            }
            Err(e) => {
                warn!("{} failed: {}", step.display(), e);
                plan.pinned_version.clone()
            }
        }
    }
}

async fn read_stamp(path: &Path) -> Option<InstallStamp> {
    let bytes = fs::read(path).await.ok()?;
    serde_json::from_slice(&bytes).ok()
}
