//! Application manifest (`package.json`) loading.

use crate::error::{BuildError, BuildResult};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::path::Path;

/// Manifest file name.
pub const MANIFEST_FILE: &str = "package.json";

/// `engines` block of the manifest.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Engines {
    /// Runtime version range.
    pub node: Option<String>,
    /// Pinned npm version.
    pub npm: Option<String>,
}

/// The subset of `package.json` the engine reads.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Manifest {
    #[serde(default, deserialize_with = "null_as_default")]
    pub engines: Engines,

    /// Script values npm tolerates but never runs (null, numbers) are kept
    /// as-is; only string entries are read.
    #[serde(default, deserialize_with = "null_as_default")]
    pub scripts: BTreeMap<String, Value>,

    /// Package manager pin, e.g. `pnpm@8.6.0`.
    #[serde(rename = "packageManager")]
    pub package_manager: Option<String>,

    /// Raw file contents, used for install digests.
    #[serde(skip)]
    pub raw: Vec<u8>,
}

impl Manifest {
    /// Parse a manifest from its bytes.
    pub fn parse(bytes: &[u8], path: &Path) -> BuildResult<Self> {
        let mut manifest: Manifest =
            serde_json::from_slice(bytes).map_err(|e| BuildError::InvalidManifest {
                path: path.to_path_buf(),
                reason: e.to_string(),
            })?;
        manifest.raw = bytes.to_vec();
        Ok(manifest)
    }

    /// Load `package.json` from the application directory, if present.
    pub fn load(app_dir: &Path) -> BuildResult<Option<Self>> {
        let path = app_dir.join(MANIFEST_FILE);
        if !path.is_file() {
            return Ok(None);
        }
        let bytes = std::fs::read(&path)?;
        Self::parse(&bytes, &path).map(Some)
    }

    /// Declared `engines.node` range, ignoring blank values.
    pub fn node_range(&self) -> Option<&str> {
        self.engines
            .node
            .as_deref()
            .filter(|r| !r.trim().is_empty())
    }

    /// Declared `scripts.start`, ignoring blank values.
    pub fn start_script(&self) -> Option<&str> {
        self.scripts
            .get("start")
            .and_then(Value::as_str)
            .filter(|s| !s.trim().is_empty())
    }
}

fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de> + Default,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_parse_full_manifest() {
        let json = br#"{
            "name": "simple",
            "engines": {"node": ">=16 <17", "npm": "8.3.1"},
            "scripts": {"start": "node server.js", "test": "jest"},
            "packageManager": "npm@8.3.1"
        }"#;
        let manifest = Manifest::parse(json, Path::new("package.json")).unwrap();

        assert_eq!(manifest.node_range(), Some(">=16 <17"));
        assert_eq!(manifest.engines.npm.as_deref(), Some("8.3.1"));
        assert_eq!(manifest.start_script(), Some("node server.js"));
        assert_eq!(manifest.package_manager.as_deref(), Some("npm@8.3.1"));
        assert_eq!(manifest.raw, json.to_vec());
    }

    #[test]
    fn test_parse_minimal_manifest() {
        let manifest = Manifest::parse(b"{}", Path::new("package.json")).unwrap();
        assert!(manifest.node_range().is_none());
        assert!(manifest.start_script().is_none());
    }

    #[test]
    fn test_blank_values_ignored() {
        let json = br#"{"engines": {"node": "  "}, "scripts": {"start": ""}}"#;
        let manifest = Manifest::parse(json, Path::new("package.json")).unwrap();
        assert!(manifest.node_range().is_none());
        assert!(manifest.start_script().is_none());
    }

    #[test]
    fn test_null_engines_and_scripts() {
        let json = br#"{"engines": null, "scripts": null}"#;
        let manifest = Manifest::parse(json, Path::new("package.json")).unwrap();
        assert!(manifest.node_range().is_none());
        assert!(manifest.start_script().is_none());
    }

    #[test]
    fn test_non_string_scripts_tolerated() {
        let json = br#"{"scripts": {"start": "node s.js", "x": null, "y": 3}}"#;
        let manifest = Manifest::parse(json, Path::new("package.json")).unwrap();
        assert_eq!(manifest.start_script(), Some("node s.js"));

        let json = br#"{"scripts": {"start": false}}"#;
        let manifest = Manifest::parse(json, Path::new("package.json")).unwrap();
        assert!(manifest.start_script().is_none());
    }

    #[test]
    fn test_invalid_json() {
        let err = Manifest::parse(b"{not json", Path::new("package.json")).unwrap_err();
        assert!(matches!(err, BuildError::InvalidManifest { .. }));
    }

    #[test]
    fn test_load_absent() {
        let dir = tempdir().unwrap();
        assert!(Manifest::load(dir.path()).unwrap().is_none());
    }
}
