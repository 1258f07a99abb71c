//! Build metadata (Bill of Materials) emission.
//!
//! The BOM is the externally observable contract of a build. Entry names and
//! metadata keys are matched literally by downstream tooling.

use crate::devmode::DevModeConfig;
use crate::entrypoint::{EntrypointCommand, EntrypointSource};
use crate::installer::InstallReport;
use crate::package_manager::{InstallPlan, PackageManagerKind};
use crate::version::ResolvedVersion;
use semver::Version;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

/// BOM name of the runtime entry.
pub const RUNTIME_ENTRY: &str = "nodejs";
/// BOM name of the dev mode entry.
pub const DEVMODE_ENTRY: &str = "devmode";
/// BOM name of the entrypoint override entry.
pub const ENTRYPOINT_ENTRY: &str = "entrypoint";
/// Metadata key listing dev mode sync rules.
pub const DEVMODE_SYNC_KEY: &str = "devmode.sync";

/// Installed runtime.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuntimeMetadata {
    pub name: String,
    pub version: Version,
}

/// Summary of the install plan that ran.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PackageManagerMetadata {
    pub kind: PackageManagerKind,
    pub version: Option<String>,
    pub command: Vec<String>,
}

/// Every decision of a build. Optional parts are absent when their feature
/// was not activated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildMetadataRecord {
    pub runtime: RuntimeMetadata,
    pub package_manager: Option<PackageManagerMetadata>,
    pub devmode: Option<DevModeConfig>,
    pub entrypoint: Option<EntrypointCommand>,
}

/// One BOM entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BomEntry {
    pub name: String,
    pub metadata: Map<String, Value>,
}

impl BomEntry {
    fn new(name: &str, metadata: Value) -> Self {
        let metadata = match metadata {
            Value::Object(map) => map,
            _ => Map::new(),
        };
        BomEntry {
            name: name.to_string(),
            metadata,
        }
    }
}

impl BuildMetadataRecord {
    /// Aggregate the outputs of every component.
    pub fn emit(
        runtime: &ResolvedVersion,
        install: Option<(&InstallPlan, Option<&InstallReport>)>,
        devmode: Option<DevModeConfig>,
        entrypoint: &EntrypointCommand,
    ) -> Self {
        let package_manager = install.map(|(plan, report)| PackageManagerMetadata {
            kind: plan.kind,
            version: report
                .and_then(|r| r.manager_version.clone())
                .or_else(|| plan.pinned_version.clone()),
            command: plan.command.clone(),
        });

        BuildMetadataRecord {
            runtime: RuntimeMetadata {
                name: RUNTIME_ENTRY.to_string(),
                version: runtime.version.clone(),
            },
            package_manager,
            devmode,
            entrypoint: (entrypoint.source == EntrypointSource::Override)
                .then(|| entrypoint.clone()),
        }
    }

    /// Serialize into BOM entries: runtime, package manager, dev mode,
    /// entrypoint.
    pub fn to_bom(&self) -> Vec<BomEntry> {
        let mut bom = vec![BomEntry::new(
            &self.runtime.name,
            json!({ "version": self.runtime.version.to_string() }),
        )];

        if let Some(pm) = &self.package_manager {
            let mut metadata = Map::new();
            if let Some(version) = &pm.version {
                metadata.insert("version".to_string(), json!(version));
            }
            metadata.insert("command".to_string(), json!(pm.command));
            bom.push(BomEntry::new(pm.kind.name(), Value::Object(metadata)));
        }

        if let Some(devmode) = &self.devmode {
            bom.push(BomEntry::new(
                DEVMODE_ENTRY,
                json!({ DEVMODE_SYNC_KEY: devmode.sync_rules }),
            ));
        }

        if let Some(entrypoint) = &self.entrypoint {
            bom.push(BomEntry::new(
                ENTRYPOINT_ENTRY,
                json!({ "command": entrypoint.tokens }),
            ));
        }

        bom
    }

    /// Whether the BOM has an entry called `name`.
    pub fn uses(&self, name: &str) -> bool {
        self.entry(name).is_some()
    }

    /// The BOM entry called `name`.
    pub fn entry(&self, name: &str) -> Option<BomEntry> {
        self.to_bom().into_iter().find(|e| e.name == name)
    }
}
