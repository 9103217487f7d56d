//! Error types for the promptlens engine.

use thiserror::Error;

/// Result type alias using promptlens' Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Core error type for promptlens operations.
#[derive(Error, Debug)]
pub enum Error {
    /// Database operation failed (wraps sqlx::Error)
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// A uniqueness constraint rejected an insert. Carries the conflicting
    /// key so callers can re-read the row that won the race.
    #[error("Unique violation: {0}")]
    UniqueViolation(String),

    /// Resource not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// Extraction backend failed (timeout, navigation error, absent content)
    #[error("Backend error: {0}")]
    Backend(String),

    /// Completion service failed or returned malformed extraction output
    #[error("Completion error: {0}")]
    Completion(String),

    /// Serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Invalid input
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// HTTP/network request failed
    #[error("Request error: {0}")]
    Request(String),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Serialization(e.to_string())
    }
}

impl From<reqwest::Error> for Error {
    fn from(e: reqwest::Error) -> Self {
        Error::Request(e.to_string())
    }
}
