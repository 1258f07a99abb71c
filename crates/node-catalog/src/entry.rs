//! Catalog entry model
//!
//! The distribution index (`index.json`) lists every published release as a
//! JSON object. Only the fields the resolver needs are kept.

use semver::Version;
use serde::{Deserialize, Serialize};
use tracing::warn;

/// One installable runtime release
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogEntry {
    /// Release version, without the `v` prefix used by the index
    pub version: Version,
    /// LTS codename when the release belongs to an LTS line
    pub lts: Option<String>,
    /// Version of npm bundled with this release
    pub npm: Option<String>,
}

impl CatalogEntry {
    /// Create an entry with no LTS codename or bundled npm
    pub fn new(version: Version) -> Self {
        CatalogEntry {
            version,
            lts: None,
            npm: None,
        }
    }

    /// Mark the entry as part of an LTS line
    pub fn with_lts(mut self, codename: &str) -> Self {
        self.lts = Some(codename.to_string());
        self
    }

    /// Whether this release belongs to an LTS line
    pub fn is_lts(&self) -> bool {
        self.lts.is_some()
    }
}

/// Raw row of the distribution index
#[derive(Debug, Deserialize)]
pub(crate) struct IndexRow {
    pub version: String,
    #[serde(default)]
    pub lts: serde_json::Value,
    #[serde(default)]
    pub npm: Option<String>,
}

impl IndexRow {
    /// Normalize an index row; rows with unparsable versions yield `None`
    pub(crate) fn into_entry(self) -> Option<CatalogEntry> {
        let raw = self.version.strip_prefix('v').unwrap_or(&self.version);
        let version = match Version::parse(raw) {
            Ok(v) => v,
            Err(e) => {
                warn!("Skipping catalog row {:?}: {}", self.version, e);
                return None;
            }
        };

        // `lts` is `false` for current releases and a codename string otherwise
        let lts = match self.lts {
            serde_json::Value::String(codename) => Some(codename),
            _ => None,
        };

        Some(CatalogEntry {
            version,
            lts,
            npm: self.npm,
        })
    }
}

/// Parse a distribution index body into entries sorted newest first
pub fn parse_index(body: &str) -> serde_json::Result<Vec<CatalogEntry>> {
    let rows: Vec<IndexRow> = serde_json::from_str(body)?;
    let mut entries: Vec<CatalogEntry> = rows.into_iter().filter_map(IndexRow::into_entry).collect();
    sort_newest_first(&mut entries);
    Ok(entries)
}

/// Sort entries newest first and drop duplicate versions
pub fn sort_newest_first(entries: &mut Vec<CatalogEntry>) {
    entries.sort_by(|a, b| b.version.cmp(&a.version));
    entries.dedup_by(|a, b| a.version == b.version);
}

#[cfg(test)]
mod tests {
    use super::*;

    const INDEX: &str = r#"[
        {"version":"v18.12.0","date":"2022-10-25","npm":"8.19.2","lts":"Hydrogen"},
        {"version":"v19.0.0","date":"2022-10-18","npm":"8.19.2","lts":false},
        {"version":"v16.17.1","date":"2022-09-23","npm":"8.15.0","lts":"Gallium"},
        {"version":"garbage","lts":false}
    ]"#;

    #[test]
    fn test_parse_index_strips_prefix_and_sorts() {
        let entries = parse_index(INDEX).unwrap();
        let versions: Vec<String> = entries.iter().map(|e| e.version.to_string()).collect();
        assert_eq!(versions, vec!["19.0.0", "18.12.0", "16.17.1"]);
    }

    #[test]
    fn test_parse_index_lts_codename() {
        let entries = parse_index(INDEX).unwrap();
        assert_eq!(entries[0].lts, None);
        assert_eq!(entries[1].lts.as_deref(), Some("Hydrogen"));
        assert_eq!(entries[2].npm.as_deref(), Some("8.15.0"));
    }

    #[test]
    fn test_parse_index_rejects_non_array() {
        assert!(parse_index(r#"{"version":"v1.0.0"}"#).is_err());
    }

    #[test]
    fn test_sort_dedups() {
        let mut entries = vec![
            CatalogEntry::new(Version::new(1, 0, 0)),
            CatalogEntry::new(Version::new(2, 0, 0)),
            CatalogEntry::new(Version::new(1, 0, 0)),
        ];
        sort_newest_first(&mut entries);
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].version, Version::new(2, 0, 0));
    }
}
