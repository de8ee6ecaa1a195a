//! Error types for cmpd

use std::path::PathBuf;

use thiserror::Error;

/// Main error type for cmpd operations
#[derive(Error, Debug)]
pub enum CmpdError {
    /// A metadata record exists on disk but is empty or unparsable
    #[error("Corrupt cache record {}: {reason}", .path.display())]
    CorruptRecord { path: PathBuf, reason: String },

    #[error("Request to {url} failed: {message}")]
    Http { url: String, message: String },

    #[error("HTTP {status} from {url}")]
    HttpStatus { url: String, status: u16 },

    #[error("Response from {url} has no content-length header")]
    MissingContentLength { url: String },

    #[error("Download from {url} ended early: expected {expected} bytes, got {received}")]
    Truncated {
        url: String,
        expected: u64,
        received: u64,
    },

    #[error("File {file_id} has no download URL")]
    NoDownloadUrl { file_id: i64 },

    #[error("Failed to download {name} after {attempts} attempts")]
    DownloadFailed { name: String, attempts: u32 },

    #[error("Invalid file date: {0}")]
    InvalidTimestamp(String),

    #[error("Invalid modpack manifest: {0}")]
    Manifest(String),

    #[error("Could not resolve project {project_id}")]
    RootUnavailable {
        project_id: i64,
        #[source]
        source: Box<CmpdError>,
    },

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Archive error: {0}")]
    Zip(#[from] zip::result::ZipError),
}

impl CmpdError {
    /// Whether this error means a cache record is present but unusable
    pub fn is_corruption(&self) -> bool {
        matches!(self, CmpdError::CorruptRecord { .. })
    }

    pub(crate) fn http(url: &str, err: impl std::fmt::Display) -> Self {
        CmpdError::Http {
            url: url.to_string(),
            message: err.to_string(),
        }
    }
}

/// Result type alias for cmpd operations
pub type Result<T> = std::result::Result<T, CmpdError>;
