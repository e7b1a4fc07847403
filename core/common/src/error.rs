//! Common error types for drivedrop.

use thiserror::Error;

/// Top-level error type for drivedrop operations.
#[derive(Debug, Error)]
pub enum Error {
    /// Credentials could not be established or renewed.
    #[error("Authorization error: {0}")]
    Authorization(String),

    /// No usable service handle exists at call time.
    #[error("Service unavailable: {0}")]
    ServiceUnavailable(String),

    /// The remote storage service rejected or failed the create call.
    #[error("Upload error: {0}")]
    Upload(String),

    /// Network or transport failure.
    #[error("Network error: {0}")]
    Network(String),

    /// I/O operation failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization or deserialization failed.
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Invalid input provided.
    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Serialization(err.to_string())
    }
}

/// Result type alias using the common Error.
pub type Result<T> = std::result::Result<T, Error>;
