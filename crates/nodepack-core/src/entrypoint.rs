//! Startup command resolution: override, then start script, then convention.

use crate::error::{BuildError, BuildResult};
use crate::manifest::Manifest;
use crate::package_manager::PackageManagerKind;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// File run when neither an override nor a start script exists.
pub const DEFAULT_ENTRY_FILE: &str = "server.js";

const SCRIPT_EXTENSIONS: [&str; 5] = [".js", ".mjs", ".cjs", ".coffee", ".litcoffee"];

/// Which tier produced the command.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntrypointSource {
    Override,
    StartScript,
    Convention,
}

/// The image's startup command.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntrypointCommand {
    /// Program followed by its arguments.
    pub tokens: Vec<String>,
    /// The command as written by its source.
    pub raw: String,
    pub source: EntrypointSource,
    /// Application file the command runs, when one can be identified.
    pub script_file: Option<String>,
}

/// Resolve the startup command.
pub fn resolve_entrypoint(
    override_cmd: Option<&str>,
    manifest: Option<&Manifest>,
    manager: Option<PackageManagerKind>,
    app_dir: &Path,
) -> BuildResult<EntrypointCommand> {
    if let Some(raw) = override_cmd {
        let tokens = shlex::split(raw)
            .filter(|t| !t.is_empty())
            .ok_or_else(|| {
                BuildError::MissingEntrypoint(format!("cannot parse GOOGLE_ENTRYPOINT {:?}", raw))
            })?;
        let script_file = find_script(&tokens);
        return Ok(EntrypointCommand {
            tokens,
            raw: raw.to_string(),
            source: EntrypointSource::Override,
            script_file,
        });
    }

    if let Some(script) = manifest.and_then(Manifest::start_script) {
        let manager = manager.unwrap_or(PackageManagerKind::Npm).name();
        let script_file = shlex::split(script)
            .and_then(|tokens| find_script(&tokens))
            .or_else(|| default_entry_file(app_dir));
        return Ok(EntrypointCommand {
            tokens: vec![manager.to_string(), "start".to_string()],
            raw: format!("{} start", manager),
            source: EntrypointSource::StartScript,
            script_file,
        });
    }

    if let Some(file) = default_entry_file(app_dir) {
        return Ok(EntrypointCommand {
            tokens: vec!["node".to_string(), file.clone()],
            raw: format!("node {}", file),
            source: EntrypointSource::Convention,
            script_file: Some(file),
        });
    }

    Err(BuildError::MissingEntrypoint(format!(
        "set GOOGLE_ENTRYPOINT, add a \"start\" script to package.json, or provide {}",
        DEFAULT_ENTRY_FILE
    )))
}

fn default_entry_file(app_dir: &Path) -> Option<String> {
    app_dir
        .join(DEFAULT_ENTRY_FILE)
        .is_file()
        .then(|| DEFAULT_ENTRY_FILE.to_string())
}

fn find_script(tokens: &[String]) -> Option<String> {
    tokens
        .iter()
        .skip(1)
        .find(|t| SCRIPT_EXTENSIONS.iter().any(|ext| t.ends_with(ext)))
        .cloned()
}
