//! Error types for passport discovery

use std::time::Duration;

use thiserror::Error;

/// Result type for discovery operations
pub type Result<T> = std::result::Result<T, DiscoveryError>;

/// Errors raised by fetchers and source readers
///
/// Discovery itself never fails on these: an erroring source is logged and
/// treated as "nothing here" so the next source can be tried.
#[derive(Error, Debug, Clone)]
pub enum DiscoveryError {
    /// The request did not complete in time
    #[error("Request timed out after {0:?}")]
    Timeout(Duration),

    /// Transport-level HTTP failure (DNS, connect, TLS, body read)
    #[error("HTTP error: {0}")]
    HttpError(String),

    /// Response body exceeded the fetcher's size limit
    #[error("Response body exceeds {limit} bytes")]
    BodyTooLarge { limit: usize },

    /// An external reader failed to run
    #[error("{reader} failed: {reason}")]
    ReaderFailed { reader: &'static str, reason: String },

    /// Filesystem error while reading an artifact or companion file
    #[error("I/O error: {0}")]
    Io(String),

    /// Content was not in the expected format
    #[error("Invalid format: {0}")]
    InvalidFormat(String),

    /// Operation not supported by this implementation
    #[error("Unsupported: {0}")]
    Unsupported(String),
}

impl From<reqwest::Error> for DiscoveryError {
    fn from(err: reqwest::Error) -> Self {
        DiscoveryError::HttpError(err.to_string())
    }
}

impl From<serde_json::Error> for DiscoveryError {
    fn from(err: serde_json::Error) -> Self {
        DiscoveryError::InvalidFormat(err.to_string())
    }
}

impl From<std::io::Error> for DiscoveryError {
    fn from(err: std::io::Error) -> Self {
        DiscoveryError::Io(err.to_string())
    }
}
