use std::io;
use std::sync::Arc;

use thiserror::Error;

#[derive(Error, Debug, Clone)]
pub enum FlarmError {
    #[error("I/O Error: {0}")]
    Io(#[from] Arc<std::io::Error>),

    #[error("HTTP Request Error: {0}")]
    Http(#[from] Arc<reqwest::Error>),

    #[error("JSON Parsing Error: {0}")]
    Json(#[from] Arc<serde_json::Error>),

    #[error("Configuration Error: {0}")]
    Config(String),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Manifest could not be parsed: {0}")]
    ManifestUnparseable(String),

    #[error("Network unavailable: {0}")]
    NetworkUnavailable(String),

    #[error("Timed out: {0}")]
    Timeout(String),

    #[error("Resource Not Found: {0}")]
    NotFound(String),

    #[error("No compatible package found in the releases of {repository}")]
    NoCompatibleAsset {
        repository: String,
        releases_url: String,
    },

    #[error("Incompatible platform: {0}")]
    IncompatiblePlatform(String),

    #[error("Archive is corrupt: {0}")]
    ArchiveCorrupt(String),

    #[error("Permission denied: {0} (try again with elevated privileges)")]
    PermissionDenied(String),

    #[error("Installation Error: {0}")]
    InstallError(String),

    #[error("Uninstall Error: {0}")]
    UninstallError(String),

    #[error("Generic Error: {0}")]
    Generic(String),
}

impl FlarmError {
    /// Wraps an I/O error with a description of what was being attempted.
    /// Permission failures get their own variant so callers can suggest an
    /// elevated retry.
    pub fn from_io(err: io::Error, context: impl AsRef<str>) -> Self {
        let context = context.as_ref();
        match err.kind() {
            io::ErrorKind::PermissionDenied => {
                FlarmError::PermissionDenied(format!("{context}: {err}"))
            }
            kind => FlarmError::Io(Arc::new(io::Error::new(kind, format!("{context}: {err}")))),
        }
    }

    /// Transient failures worth retrying as-is.
    pub fn is_retryable(&self) -> bool {
        match self {
            FlarmError::Timeout(_) | FlarmError::NetworkUnavailable(_) => true,
            FlarmError::Http(e) => e.is_timeout() || e.is_connect(),
            _ => false,
        }
    }

    /// Human-browsable page the user can be pointed at when automatic
    /// selection gave up.
    pub fn releases_fallback(&self) -> Option<&str> {
        match self {
            FlarmError::NoCompatibleAsset { releases_url, .. } => Some(releases_url),
            _ => None,
        }
    }
}

impl From<std::io::Error> for FlarmError {
    fn from(err: std::io::Error) -> Self {
        FlarmError::Io(Arc::new(err))
    }
}

impl From<reqwest::Error> for FlarmError {
    fn from(err: reqwest::Error) -> Self {
        FlarmError::Http(Arc::new(err))
    }
}

impl From<serde_json::Error> for FlarmError {
    fn from(err: serde_json::Error) -> Self {
        FlarmError::Json(Arc::new(err))
    }
}

pub type Result<T> = std::result::Result<T, FlarmError>;
