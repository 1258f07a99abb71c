//! Package manager detection and install planning.
//!
//! Detection gathers every signal in the source tree, ranks them, and keeps
//! the single highest-ranked kind:
//!
//! 1. `yarn.lock`
//! 2. `pnpm-lock.yaml`
//! 3. `package-lock.json` / `npm-shrinkwrap.json`
//! 4. `packageManager` pin in `package.json`, or nothing at all (npm)
//!
//! Any lockfile outranks the pin; a pin naming another manager is warned about.

use crate::error::{BuildError, BuildResult};
use crate::manifest::Manifest;
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::{debug, warn};

/// Supported package managers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PackageManagerKind {
    Npm,
    Yarn,
    Pnpm,
}

impl PackageManagerKind {
    /// All kinds, in declaration order.
    pub const ALL: [PackageManagerKind; 3] = [
        PackageManagerKind::Npm,
        PackageManagerKind::Yarn,
        PackageManagerKind::Pnpm,
    ];

    /// Name used for the executable, the BOM entry and `packageManager` pins.
    pub fn name(&self) -> &'static str {
        match self {
            PackageManagerKind::Npm => "npm",
            PackageManagerKind::Yarn => "yarn",
            PackageManagerKind::Pnpm => "pnpm",
        }
    }

    /// Parse a manager name.
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|k| k.name() == name)
    }

    /// Lockfiles owned by this manager.
    pub fn lockfiles(&self) -> &'static [&'static str] {
        match self {
            PackageManagerKind::Npm => &["package-lock.json", "npm-shrinkwrap.json"],
            PackageManagerKind::Yarn => &["yarn.lock"],
            PackageManagerKind::Pnpm => &["pnpm-lock.yaml"],
        }
    }
}

impl std::fmt::Display for PackageManagerKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// One piece of evidence about the package manager.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Signal {
    Lockfile {
        kind: PackageManagerKind,
        file: &'static str,
    },
    ManifestPin {
        kind: PackageManagerKind,
        version: Option<String>,
    },
}

impl Signal {
    fn kind(&self) -> PackageManagerKind {
        match self {
            Signal::Lockfile { kind, .. } | Signal::ManifestPin { kind, .. } => *kind,
        }
    }

    /// Lower ranks win.
    fn rank(&self) -> u8 {
        match self {
            Signal::Lockfile {
                kind: PackageManagerKind::Yarn,
                ..
            } => 0,
            Signal::Lockfile {
                kind: PackageManagerKind::Pnpm,
                ..
            } => 1,
            Signal::Lockfile {
                kind: PackageManagerKind::Npm,
                ..
            } => 2,
            Signal::ManifestPin { .. } => 3,
        }
    }
}

/// The selected package manager.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Detection {
    pub kind: PackageManagerKind,
    /// Exact manager version requested by the manifest.
    pub pinned_version: Option<String>,
    /// Lockfile belonging to the selected manager, if present.
    pub lockfile: Option<String>,
}

/// Parse a `packageManager` pin such as `pnpm@8.6.0+sha512.abc`.
pub fn parse_pin(pin: &str) -> Option<(PackageManagerKind, Option<String>)> {
    let (name, version) = match pin.split_once('@') {
        Some((name, version)) => (name, Some(version)),
        None => (pin, None),
    };
    let kind = PackageManagerKind::from_name(name.trim())?;
    let version = version
        .map(|v| v.split('+').next().unwrap_or(v).trim().to_string())
        .filter(|v| !v.is_empty());
    Some((kind, version))
}

/// Collect every signal present in `app_dir`.
pub fn collect_signals(app_dir: &Path, manifest: Option<&Manifest>) -> Vec<Signal> {
    let mut signals = Vec::new();

    for kind in PackageManagerKind::ALL {
        for file in kind.lockfiles() {
            if app_dir.join(file).is_file() {
                signals.push(Signal::Lockfile { kind, file: *file });
            }
        }
    }

    if let Some(pin) = manifest.and_then(|m| m.package_manager.as_deref()) {
        match parse_pin(pin) {
            Some((kind, version)) => signals.push(Signal::ManifestPin { kind, version }),
            None => warn!("Ignoring unsupported packageManager {:?}", pin),
        }
    }

    signals
}

/// Pick exactly one manager from the collected signals.
pub fn select(signals: &[Signal], manifest: Option<&Manifest>) -> BuildResult<Detection> {
    let Some(top_rank) = signals.iter().map(Signal::rank).min() else {
        return Ok(npm_detection(None, manifest));
    };

    let mut winners: Vec<PackageManagerKind> = signals
        .iter()
        .filter(|s| s.rank() == top_rank)
        .map(Signal::kind)
        .collect();
    winners.sort();
    winners.dedup();
    if winners.len() != 1 {
        return Err(BuildError::AmbiguousPackageManager {
            found: winners.iter().map(|k| k.name().to_string()).collect(),
        });
    }
    let kind = winners[0];

    let lockfile = signals.iter().find_map(|s| match s {
        Signal::Lockfile { kind: k, file } if *k == kind => Some(file.to_string()),
        _ => None,
    });

    let mut pinned_version = None;
    for signal in signals {
        if let Signal::ManifestPin { kind: pin_kind, version } = signal {
            if *pin_kind == kind {
                pinned_version = version.clone();
            } else {
                warn!(
                    "package.json pins {} but the lockfile selects {}; using {}",
                    pin_kind, kind, kind
                );
            }
        }
    }

    if kind == PackageManagerKind::Npm {
        let mut detection = npm_detection(lockfile, manifest);
        if pinned_version.is_some() {
            detection.pinned_version = pinned_version;
        }
        return Ok(detection);
    }

    Ok(Detection {
        kind,
        pinned_version,
        lockfile,
    })
}

fn npm_detection(lockfile: Option<String>, manifest: Option<&Manifest>) -> Detection {
    Detection {
        kind: PackageManagerKind::Npm,
        pinned_version: manifest
            .and_then(|m| m.engines.npm.as_deref())
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .map(str::to_string),
        lockfile,
    }
}

/// Detect the package manager for an application.
///
/// Without a manifest there is nothing to install: the result is `None` when
/// an entrypoint override exists and `MissingEntrypoint` otherwise.
pub fn detect(
    app_dir: &Path,
    manifest: Option<&Manifest>,
    has_entrypoint_override: bool,
) -> BuildResult<Option<Detection>> {
    if manifest.is_none() {
        if has_entrypoint_override {
            debug!("No package.json; running the runtime directly");
            return Ok(None);
        }
        return Err(BuildError::MissingEntrypoint(
            "no package.json found and GOOGLE_ENTRYPOINT is not set".to_string(),
        ));
    }

    let signals = collect_signals(app_dir, manifest);
    debug!(?signals, "Package manager signals");
    select(&signals, manifest).map(Some)
}

/// How strictly the lockfile is honoured.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InstallStrategy {
    /// Reproducible install that fails if the lockfile is out of date.
    Clean,
    /// Regular install that may update the lockfile.
    Ordinary,
}

/// Everything needed to run one dependency install.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstallPlan {
    pub kind: PackageManagerKind,
    pub strategy: InstallStrategy,
    /// Steps provisioning the manager itself, run before `command`.
    pub prepare: Vec<Vec<String>>,
    /// The install invocation.
    pub command: Vec<String>,
    pub pinned_version: Option<String>,
    pub lockfile: Option<String>,
}

impl InstallPlan {
    /// Build the plan for a detection. Dev mode always installs incrementally.
    pub fn new(detection: &Detection, devmode: bool) -> Self {
        let strategy = if detection.lockfile.is_some() && !devmode {
            InstallStrategy::Clean
        } else {
            InstallStrategy::Ordinary
        };

        let name = detection.kind.name();
        let prepare = match (detection.kind, &detection.pinned_version) {
            (PackageManagerKind::Npm, None) => vec![],
            (_, pin) => vec![args(&[
                "npm",
                "install",
                "-g",
                &format!("{}@{}", name, pin.as_deref().unwrap_or("latest")),
            ])],
        };

        let command = match (detection.kind, strategy) {
            (PackageManagerKind::Npm, InstallStrategy::Clean) => args(&["npm", "ci"]),
            (PackageManagerKind::Yarn, InstallStrategy::Clean) => {
                if is_berry(detection.pinned_version.as_deref()) {
                    args(&["yarn", "install", "--immutable"])
                } else {
                    args(&["yarn", "install", "--frozen-lockfile"])
                }
            }
            (PackageManagerKind::Pnpm, InstallStrategy::Clean) => {
                args(&["pnpm", "install", "--frozen-lockfile"])
            }
            (_, InstallStrategy::Ordinary) => args(&[name, "install"]),
        };

        InstallPlan {
            kind: detection.kind,
            strategy,
            prepare,
            command,
            pinned_version: detection.pinned_version.clone(),
            lockfile: detection.lockfile.clone(),
        }
    }

    /// Command printing the manager's version.
    pub fn version_probe(&self) -> Vec<String> {
        args(&[self.kind.name(), "--version"])
    }
}

/// Yarn 2+ ("berry") replaced `--frozen-lockfile` with `--immutable`.
fn is_berry(pin: Option<&str>) -> bool {
    pin.and_then(|v| v.split('.').next())
        .and_then(|major| major.parse::<u64>().ok())
        .map(|major| major >= 2)
        .unwrap_or(false)
}

fn args(parts: &[&str]) -> Vec<String> {
    parts.iter().map(|s| s.to_string()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use tempfile::tempdir;
    use tracing_test::traced_test;

    fn manifest(json: &str) -> Manifest {
        Manifest::parse(json.as_bytes(), Path::new("package.json")).unwrap()
    }

    fn app(files: &[&str]) -> tempfile::TempDir {
        let dir = tempdir().unwrap();
        for file in files {
            std::fs::write(dir.path().join(file), "").unwrap();
        }
        dir
    }

    #[test]
    fn test_parse_pin() {
        assert_eq!(
            parse_pin("pnpm@8.6.0+sha512.abcdef"),
            Some((PackageManagerKind::Pnpm, Some("8.6.0".to_string())))
        );
        assert_eq!(parse_pin("yarn"), Some((PackageManagerKind::Yarn, None)));
        assert_eq!(parse_pin("bun@1.0.0"), None);
    }

    #[test]
    fn test_no_lockfile_defaults_to_npm() {
        let dir = app(&[]);
        let m = manifest("{}");
        let detection = detect(dir.path(), Some(&m), false).unwrap().unwrap();
        assert_eq!(detection.kind, PackageManagerKind::Npm);
        assert!(detection.lockfile.is_none());
    }

    #[test]
    fn test_yarn_lock_wins_over_npm_lock() {
        let dir = app(&["yarn.lock", "package-lock.json"]);
        let m = manifest("{}");
        let detection = detect(dir.path(), Some(&m), false).unwrap().unwrap();
        assert_eq!(detection.kind, PackageManagerKind::Yarn);
        assert_eq!(detection.lockfile.as_deref(), Some("yarn.lock"));
    }

    #[test]
    fn test_yarn_lock_wins_over_pnpm_lock() {
        let dir = app(&["yarn.lock", "pnpm-lock.yaml"]);
        let m = manifest("{}");
        let detection = detect(dir.path(), Some(&m), false).unwrap().unwrap();
        assert_eq!(detection.kind, PackageManagerKind::Yarn);
    }

    #[test]
    fn test_pnpm_lock() {
        let dir = app(&["pnpm-lock.yaml"]);
        let m = manifest("{}");
        let detection = detect(dir.path(), Some(&m), false).unwrap().unwrap();
        assert_eq!(detection.kind, PackageManagerKind::Pnpm);
    }

    #[test]
    fn test_npm_lock_beats_conflicting_pin() {
        let dir = app(&["package-lock.json"]);
        let m = manifest(r#"{"packageManager": "pnpm@8.6.0"}"#);
        let detection = detect(dir.path(), Some(&m), false).unwrap().unwrap();
        assert_eq!(detection.kind, PackageManagerKind::Npm);
        assert_eq!(detection.lockfile.as_deref(), Some("package-lock.json"));
        assert!(detection.pinned_version.is_none());

        let plan = InstallPlan::new(&detection, false);
        assert_eq!(plan.command, vec!["npm", "ci"]);
        assert_eq!(plan.strategy, InstallStrategy::Clean);
    }

    #[traced_test]
    #[test]
    fn test_conflicting_pin_is_warned() {
        let dir = app(&["package-lock.json"]);
        let m = manifest(r#"{"packageManager": "pnpm@8.6.0"}"#);
        detect(dir.path(), Some(&m), false).unwrap();
        assert!(logs_contain("package.json pins pnpm but the lockfile selects npm"));
    }

    #[test]
    fn test_pin_decides_without_lockfile() {
        let dir = app(&[]);
        let m = manifest(r#"{"packageManager": "pnpm@8.6.0"}"#);
        let detection = detect(dir.path(), Some(&m), false).unwrap().unwrap();
        assert_eq!(detection.kind, PackageManagerKind::Pnpm);
        assert_eq!(detection.pinned_version.as_deref(), Some("8.6.0"));
        assert!(detection.lockfile.is_none());
    }

    #[test]
    fn test_lockfile_beats_conflicting_pin() {
        let dir = app(&["yarn.lock"]);
        let m = manifest(r#"{"packageManager": "pnpm@8.6.0"}"#);
        let detection = detect(dir.path(), Some(&m), false).unwrap().unwrap();
        assert_eq!(detection.kind, PackageManagerKind::Yarn);
        assert!(detection.pinned_version.is_none());
    }

    #[test]
    fn test_matching_pin_keeps_version() {
        let dir = app(&["yarn.lock"]);
        let m = manifest(r#"{"packageManager": "yarn@3.6.1"}"#);
        let detection = detect(dir.path(), Some(&m), false).unwrap().unwrap();
        assert_eq!(detection.pinned_version.as_deref(), Some("3.6.1"));
    }

    #[test]
    fn test_engines_npm_pins_npm() {
        let dir = app(&["package-lock.json"]);
        let m = manifest(r#"{"engines": {"npm": "8.3.1"}}"#);
        let detection = detect(dir.path(), Some(&m), false).unwrap().unwrap();
        assert_eq!(detection.kind, PackageManagerKind::Npm);
        assert_eq!(detection.pinned_version.as_deref(), Some("8.3.1"));
        assert_eq!(detection.lockfile.as_deref(), Some("package-lock.json"));
    }

    #[test]
    fn test_no_manifest_with_override() {
        let dir = app(&[]);
        assert!(detect(dir.path(), None, true).unwrap().is_none());
    }

    #[test]
    fn test_no_manifest_without_override() {
        let dir = app(&[]);
        let err = detect(dir.path(), None, false).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::MissingEntrypoint);
    }

    #[test]
    fn test_select_guards_invariant() {
        let signals = vec![
            Signal::ManifestPin {
                kind: PackageManagerKind::Yarn,
                version: None,
            },
            Signal::ManifestPin {
                kind: PackageManagerKind::Pnpm,
                version: None,
            },
        ];
        let err = select(&signals, None).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::AmbiguousPackageManager);
    }

    #[test]
    fn test_plan_npm_ci_with_lockfile() {
        let detection = Detection {
            kind: PackageManagerKind::Npm,
            pinned_version: None,
            lockfile: Some("package-lock.json".to_string()),
        };
        let plan = InstallPlan::new(&detection, false);
        assert_eq!(plan.command, vec!["npm", "ci"]);
        assert_eq!(plan.strategy, InstallStrategy::Clean);
        assert!(plan.prepare.is_empty());
    }

    #[test]
    fn test_plan_devmode_is_ordinary() {
        let detection = Detection {
            kind: PackageManagerKind::Npm,
            pinned_version: None,
            lockfile: Some("package-lock.json".to_string()),
        };
        let plan = InstallPlan::new(&detection, true);
        assert_eq!(plan.command, vec!["npm", "install"]);
        assert_eq!(plan.strategy, InstallStrategy::Ordinary);
    }

    #[test]
    fn test_plan_pinned_npm() {
        let detection = Detection {
            kind: PackageManagerKind::Npm,
            pinned_version: Some("8.3.1".to_string()),
            lockfile: None,
        };
        let plan = InstallPlan::new(&detection, false);
        assert_eq!(plan.prepare, vec![args(&["npm", "install", "-g", "npm@8.3.1"])]);
        assert_eq!(plan.command, vec!["npm", "install"]);
    }

    #[test]
    fn test_plan_yarn_classic_and_berry() {
        let classic = Detection {
            kind: PackageManagerKind::Yarn,
            pinned_version: None,
            lockfile: Some("yarn.lock".to_string()),
        };
        let plan = InstallPlan::new(&classic, false);
        assert_eq!(plan.command, vec!["yarn", "install", "--frozen-lockfile"]);
        assert_eq!(plan.prepare, vec![args(&["npm", "install", "-g", "yarn@latest"])]);

        let berry = Detection {
            pinned_version: Some("3.6.1".to_string()),
            ..classic
        };
        let plan = InstallPlan::new(&berry, false);
        assert_eq!(plan.command, vec!["yarn", "install", "--immutable"]);
    }

    #[test]
    fn test_plan_pnpm() {
        let detection = Detection {
            kind: PackageManagerKind::Pnpm,
            pinned_version: Some("8.6.0".to_string()),
            lockfile: Some("pnpm-lock.yaml".to_string()),
        };
        let plan = InstallPlan::new(&detection, false);
        assert_eq!(plan.command, vec!["pnpm", "install", "--frozen-lockfile"]);
        assert_eq!(plan.version_probe(), vec!["pnpm", "--version"]);
    }
}
