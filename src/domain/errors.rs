//! Domain error types
//!
//! This module defines the error hierarchy for p21-extract. Transport and
//! parsing failures are mapped into these types at the adapter boundary so
//! that callers never see `reqwest` or `csv` errors directly.

use thiserror::Error;

/// Main error type
///
/// This is the primary error type used throughout the crate.
#[derive(Debug, Error)]
pub enum ExtractError {
    /// Invalid query specification or configuration
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// The identity endpoint rejected the credentials
    #[error("Authentication error: {0}")]
    Authentication(String),

    /// A data request failed
    #[error("Data fetch error: {0}")]
    DataFetch(#[from] DataFetchError),

    /// A report failed, either wrapped immediately (fail-fast) or aggregated
    #[error("Report execution error: {0}")]
    ReportExecution(String),

    /// Writing a dataset to its sink failed
    #[error("Sink error: {0}")]
    Sink(String),

    /// Serialization/deserialization errors
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(String),
}

/// Data request errors
///
/// Errors that occur when talking to the OData service. Retryable failures
/// only surface here once the retry budget is spent.
#[derive(Debug, Error)]
pub enum DataFetchError {
    /// Could not reach the server
    #[error("Failed to connect to server: {0}")]
    ConnectionFailed(String),

    /// Request timed out
    #[error("Request timeout: {0}")]
    Timeout(String),

    /// Every attempt failed with a retryable status or network error
    #[error("Request failed after {attempts} attempts (last status: {status}): {body}")]
    RetriesExhausted {
        attempts: usize,
        status: String,
        body: String,
    },

    /// Non-retryable status returned by the server
    #[error("Request failed with status {status}: {body}")]
    RequestFailed { status: u16, body: String },

    /// Response body could not be understood
    #[error("Invalid response from server: {0}")]
    InvalidResponse(String),
}

impl DataFetchError {
    /// HTTP status of the failure, when one was received
    pub fn status(&self) -> Option<u16> {
        match self {
            DataFetchError::RequestFailed { status, .. } => Some(*status),
            DataFetchError::RetriesExhausted { status, .. } => status.parse().ok(),
            _ => None,
        }
    }
}

impl From<std::io::Error> for ExtractError {
    fn from(err: std::io::Error) -> Self {
        ExtractError::Io(err.to_string())
    }
}

impl From<serde_json::Error> for ExtractError {
    fn from(err: serde_json::Error) -> Self {
        ExtractError::Serialization(err.to_string())
    }
}

impl From<toml::de::Error> for ExtractError {
    fn from(err: toml::de::Error) -> Self {
        ExtractError::Configuration(format!("TOML parse error: {err}"))
    }
}

impl From<csv::Error> for ExtractError {
    fn from(err: csv::Error) -> Self {
        ExtractError::Sink(err.to_string())
    }
}
