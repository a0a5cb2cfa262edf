//! Error types for civitai-dl
//!
//! This module provides the error handling for the library:
//! - A single crate-level [`Error`] with contextual variants
//! - [`DownloadError`] for failures reported by a download backend
//!
//! Errors raised while processing one model version are logged and swallowed by
//! the engine; everything else propagates to the caller through [`Result`].

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for civitai-dl operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for civitai-dl
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error with context about which setting is invalid
    #[error("configuration error: {message}")]
    Config {
        /// Human-readable error message describing the configuration issue
        message: String,
        /// The configuration key that caused the error (e.g., "batch.min_page")
        key: Option<String>,
    },

    /// The metadata API answered with a non-success HTTP status
    #[error("API error: HTTP {status} for {url}")]
    Api {
        /// HTTP status code returned by the API
        status: u16,
        /// The requested URL
        url: String,
    },

    /// The aria2 JSON-RPC endpoint returned an error object
    #[error("RPC error: [Code:{code}] {message}")]
    Rpc {
        /// Numeric aria2 error code
        code: i64,
        /// Message reported by aria2
        message: String,
    },

    /// Download backend error
    #[error("download error: {0}")]
    Download(#[from] DownloadError),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Network error
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    /// JSON serialization error
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// YAML serialization error (metadata snapshots)
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// External tool could not be started (aria2c missing, not executable, ...)
    #[error("external tool error: {0}")]
    ExternalTool(String),

    /// Other error
    #[error("{0}")]
    Other(String),
}

/// Errors reported by a [`FileDownloader`](crate::backend::FileDownloader)
#[derive(Debug, Error)]
pub enum DownloadError {
    /// The aria2 task reached a terminal status other than `complete`
    #[error("task {gid} for {url} ended with status '{status}'")]
    Incomplete {
        /// aria2 task identifier
        gid: String,
        /// Source URL of the task
        url: String,
        /// Terminal status reported by aria2 (e.g. "error", "removed")
        status: String,
    },

    /// The aria2c process exited unsuccessfully
    #[error("aria2c exited with code: {}", code.map_or_else(|| "signal".to_string(), |c| c.to_string()))]
    ProcessFailed {
        /// Exit code, `None` when the process was killed by a signal
        code: Option<i32>,
    },

    /// The backend reported success but its output file is missing
    #[error("expected output {path} is missing")]
    OutputMissing {
        /// Temp path the backend should have written
        path: PathBuf,
    },

    /// Moving the finished file into place failed
    #[error("failed to move {source_path} to {dest_path}: {reason}")]
    MoveFailed {
        /// Backend temp output
        source_path: PathBuf,
        /// Final destination
        dest_path: PathBuf,
        /// Underlying failure
        reason: String,
    },
}

impl Error {
    /// Shorthand for a configuration error tied to a key
    pub fn config(key: &str, message: impl Into<String>) -> Self {
        Error::Config {
            message: message.into(),
            key: Some(key.to_string()),
        }
    }

    /// HTTP status carried by this error, if any
    pub fn http_status(&self) -> Option<u16> {
        match self {
            Error::Api { status, .. } => Some(*status),
            Error::Network(e) => e.status().map(|s| s.as_u16()),
            _ => None,
        }
    }
}

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rpc_error_display_matches_aria2_style() {
        let err = Error::Rpc {
            code: 1,
            message: "Unauthorized".to_string(),
        };
        assert_eq!(err.to_string(), "RPC error: [Code:1] Unauthorized");
    }

    #[test]
    fn process_failed_display_handles_signal_termination() {
        let exited = DownloadError::ProcessFailed { code: Some(3) };
        assert_eq!(exited.to_string(), "aria2c exited with code: 3");

        let killed = DownloadError::ProcessFailed { code: None };
        assert_eq!(killed.to_string(), "aria2c exited with code: signal");
    }

    #[test]
    fn http_status_is_exposed_for_api_errors_only() {
        let api = Error::Api {
            status: 429,
            url: "https://civitai.com/api/v1/models/1".to_string(),
        };
        assert_eq!(api.http_status(), Some(429));

        let io = Error::Io(std::io::Error::other("disk"));
        assert_eq!(io.http_status(), None);
    }

    #[test]
    fn config_helper_records_key() {
        match Error::config("batch.min_page", "must be at least 1") {
            Error::Config { message, key } => {
                assert_eq!(message, "must be at least 1");
                assert_eq!(key.as_deref(), Some("batch.min_page"));
            }
            other => panic!("expected Config error, got {other:?}"),
        }
    }
}
