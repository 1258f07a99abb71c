//! Error types for node-catalog

use thiserror::Error;

/// Errors that can occur while querying the catalog or provisioning a runtime
#[derive(Error, Debug)]
pub enum CatalogError {
    /// Transport-level HTTP failure
    #[error("HTTP error: {0}")]
    Http(String),

    /// The distribution server answered with a non-success status
    #[error("{url} returned HTTP {status}")]
    Status { url: String, status: u16 },

    /// The distribution index could not be decoded
    #[error("JSON parsing error: {0}")]
    Json(#[from] serde_json::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Unpacking a runtime archive failed
    #[error("failed to extract runtime archive: {0}")]
    Extract(String),

    /// No prebuilt runtime exists for the host
    #[error("no Node.js distribution for {os}/{arch}")]
    UnsupportedPlatform { os: String, arch: String },
}

impl From<reqwest::Error> for CatalogError {
    fn from(err: reqwest::Error) -> Self {
        CatalogError::Http(err.to_string())
    }
}

/// Result type for catalog operations
pub type CatalogResult<T> = std::result::Result<T, CatalogError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_error_names_url() {
        let err = CatalogError::Status {
            url: "https://nodejs.org/dist/index.json".to_string(),
            status: 503,
        };
        let msg = err.to_string();
        assert!(msg.contains("index.json"));
        assert!(msg.contains("503"));
    }

    #[test]
    fn test_unsupported_platform_display() {
        let err = CatalogError::UnsupportedPlatform {
            os: "windows".to_string(),
            arch: "x86".to_string(),
        };
        assert_eq!(err.to_string(), "no Node.js distribution for windows/x86");
    }
}
