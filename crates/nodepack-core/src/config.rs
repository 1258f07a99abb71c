//! Build configuration collected once from the environment.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Generic runtime version override.
pub const ENV_RUNTIME_VERSION: &str = "GOOGLE_RUNTIME_VERSION";
/// Language-specific alias of [`ENV_RUNTIME_VERSION`].
pub const ENV_NODEJS_VERSION: &str = "GOOGLE_NODEJS_VERSION";
/// Startup command override.
pub const ENV_ENTRYPOINT: &str = "GOOGLE_ENTRYPOINT";
/// Dev mode switch.
pub const ENV_DEVMODE: &str = "GOOGLE_DEVMODE";
/// Per-step timeout of the dependency installer.
pub const ENV_INSTALL_TIMEOUT: &str = "NODEPACK_INSTALL_TIMEOUT_SECS";

const DEFAULT_INSTALL_TIMEOUT_SECS: u64 = 600;

/// Immutable per-build configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildConfig {
    /// Exact runtime version requested through the environment.
    pub runtime_version: Option<String>,

    /// Raw startup command override.
    pub entrypoint: Option<String>,

    /// Whether dev mode is enabled.
    pub devmode: bool,

    /// Timeout for each installer step in seconds (0 = none).
    pub install_timeout_secs: u64,
}

impl Default for BuildConfig {
    fn default() -> Self {
        BuildConfig {
            runtime_version: None,
            entrypoint: None,
            devmode: false,
            install_timeout_secs: DEFAULT_INSTALL_TIMEOUT_SECS,
        }
    }
}

impl BuildConfig {
    /// Read the configuration from the process environment.
    pub fn from_env() -> Self {
        Self::from_vars(std::env::vars())
    }

    /// Build the configuration from explicit `(name, value)` pairs.
    ///
    /// Empty values count as unset. `GOOGLE_RUNTIME_VERSION` wins over
    /// `GOOGLE_NODEJS_VERSION` when both are present.
    pub fn from_vars<I, K, V>(vars: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let vars: HashMap<String, String> = vars
            .into_iter()
            .map(|(k, v)| (k.into(), v.into()))
            .filter(|(_, v)| !v.is_empty())
            .collect();

        let runtime_version = vars
            .get(ENV_RUNTIME_VERSION)
            .or_else(|| vars.get(ENV_NODEJS_VERSION))
            .cloned();

        BuildConfig {
            runtime_version,
            entrypoint: vars.get(ENV_ENTRYPOINT).cloned(),
            devmode: vars.get(ENV_DEVMODE).map(|v| is_truthy(v)).unwrap_or(false),
            install_timeout_secs: vars
                .get(ENV_INSTALL_TIMEOUT)
                .and_then(|v| v.parse().ok())
                .unwrap_or(DEFAULT_INSTALL_TIMEOUT_SECS),
        }
    }

    /// Override the runtime version.
    pub fn with_runtime_version(mut self, version: &str) -> Self {
        self.runtime_version = Some(version.to_string());
        self
    }

    /// Override the entrypoint.
    pub fn with_entrypoint(mut self, entrypoint: &str) -> Self {
        self.entrypoint = Some(entrypoint.to_string());
        self
    }

    /// Enable dev mode.
    pub fn with_devmode(mut self) -> Self {
        self.devmode = true;
        self
    }
}

fn is_truthy(value: &str) -> bool {
    matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}
