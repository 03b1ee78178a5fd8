use std::path::PathBuf;
use thiserror::Error;

use crate::core::mma::DataOrigin;

/// Central error type for the access core.
/// Every module returns `Result<T, AccessError>`.
#[derive(Debug, Error)]
pub enum AccessError {
    // ── Resolution phase ────────────────────────────────
    #[error("Parsing error: {0}")]
    Parsing(String),

    #[error("Path configuration error: {0}")]
    PathConfiguration(String),

    #[error("Release {release} not found{}", category_suffix(.category))]
    ReleaseNotFound {
        release: String,
        category: Option<String>,
    },

    #[error("Version {key} not found for release {release}")]
    VersionNotFound { key: String, release: String },

    #[error("Release WORK requested but no work versions are set")]
    NoWorkVersions,

    // ── Remote handle ───────────────────────────────────
    #[error("API profile not found: {0}")]
    ProfileNotFound(String),

    #[error("Unresolved url parameters {missing:?} in {url}")]
    UnresolvedParameter { url: String, missing: Vec<String> },

    #[error("Authentication error: {0}")]
    Auth(String),

    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("API request failed for {url}: HTTP {status}")]
    RequestFailed { url: String, status: u16 },

    #[error("Download failed for {url}: HTTP {status}")]
    DownloadFailed { url: String, status: u16 },

    // ── Database handle ─────────────────────────────────
    #[error("Database error: {0}")]
    Database(String),

    // ── Local files ─────────────────────────────────────
    #[error("Input file {0:?} not found")]
    FileNotFound(PathBuf),

    #[error("IO error at {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    // ── Configuration ───────────────────────────────────
    #[error("Configuration error: {0}")]
    Config(String),

    // ── Load phase ──────────────────────────────────────
    #[error("Failed to load data from {origin}: {source}")]
    Load {
        origin: DataOrigin,
        source: Box<AccessError>,
    },

    #[error("Local access failed ({local}); remote fallback failed ({remote})")]
    FallbackFailed {
        local: Box<AccessError>,
        remote: Box<AccessError>,
    },
}

/// Convenience alias used throughout the crate.
pub type AccessResult<T> = Result<T, AccessError>;

impl AccessError {
    /// Wrap a load hook failure with the origin that was attempted.
    pub fn load(origin: DataOrigin, source: AccessError) -> Self {
        AccessError::Load {
            origin,
            source: Box::new(source),
        }
    }

    /// Only load-phase failures may trigger the auto-mode retry against the api.
    pub fn is_fallback_eligible(&self) -> bool {
        matches!(self, AccessError::Load { .. })
    }

    /// The origin a load-phase error was raised from, if any.
    pub fn origin(&self) -> Option<DataOrigin> {
        match self {
            AccessError::Load { origin, .. } => Some(*origin),
            AccessError::FallbackFailed { .. } => Some(DataOrigin::Api),
            _ => None,
        }
    }
}

impl From<std::io::Error> for AccessError {
    fn from(source: std::io::Error) -> Self {
        AccessError::Io {
            path: PathBuf::new(),
            source,
        }
    }
}

fn category_suffix(category: &Option<String>) -> String {
    match category {
        Some(c) => format!(" in category {c}"),
        None => String::new(),
    }
}
