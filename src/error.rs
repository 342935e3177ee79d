//! Unified error handling for the vocscan crate
//!
//! Domain-specific errors live next to the code that raises them and are
//! consolidated here into a single [`Error`] enum so they can cross module
//! boundaries without losing detail.

use std::io;
use thiserror::Error;

/// Errors that can occur during HTTP probing and page fetching
#[derive(Error, Debug)]
pub enum FetchError {
    /// HTTP request error
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// Server error with status code
    #[error("Server error: {0}")]
    ServerError(u16),

    /// Request timeout
    #[error("Request timeout")]
    Timeout,

    /// Maximum retry attempts exceeded
    #[error("Maximum retry attempts exceeded")]
    MaxRetriesExceeded,

    /// Content decoding error
    #[error("Decoding error: {0}")]
    Decode(String),
}

/// Errors that can occur while extracting fields from a vocabulary page
#[derive(Error, Debug)]
pub enum ExtractError {
    /// Vocabulary title not found in HTML
    #[error("Vocabulary title not found")]
    TitleNotFound,

    /// The details definition list is missing
    #[error("Vocabulary details block not found")]
    DetailsNotFound,

    /// A numeric field failed to parse
    #[error("Invalid numeric field `{field}`: {value}")]
    InvalidNumber { field: &'static str, value: String },
}

/// Errors that can occur while loading or flushing the approved registry
#[derive(Error, Debug)]
pub enum RegistryError {
    /// Registry file I/O error
    #[error("Registry I/O error: {0}")]
    Io(#[from] io::Error),

    /// Registry file is not valid JSON
    #[error("Registry JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Unified error type for the vocscan crate
#[derive(Error, Debug)]
pub enum Error {
    /// Fetch-specific errors
    #[error("Fetch error: {0}")]
    Fetch(#[from] FetchError),

    /// Extraction-specific errors
    #[error("Extract error: {0}")]
    Extract(#[from] ExtractError),

    /// Registry persistence errors
    #[error("Registry error: {0}")]
    Registry(#[from] RegistryError),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// HTTP client errors
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Configuration errors
    #[error("Config error: {0}")]
    Config(String),

    /// Broken pipeline invariant. Not recoverable; the scan must stop.
    #[error("Protocol violation: {0}")]
    Protocol(String),
}

impl Error {
    /// Create a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create a protocol violation error
    pub fn protocol(msg: impl Into<String>) -> Self {
        Self::Protocol(msg.into())
    }

    /// Whether the error invalidates pipeline state rather than a single ID
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Protocol(_))
    }
}

/// Result type alias using the unified Error type
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fetch_error_conversion() {
        let err: Error = FetchError::Timeout.into();
        assert!(matches!(err, Error::Fetch(FetchError::Timeout)));
        assert!(!err.is_fatal());
    }

    #[test]
    fn test_protocol_is_fatal() {
        let err = Error::protocol("duplicate moderation for id 7");
        assert!(err.is_fatal());
        assert!(err.to_string().contains("duplicate moderation"));
    }

    #[test]
    fn test_config_error() {
        let err = Error::config("workers must be greater than 0");
        assert!(matches!(err, Error::Config(_)));
    }
}
