//! Storage error types.

use crate::config::ConfigError;

/// Errors raised by storage backends.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// HTTP transport error talking to the backend.
    #[error("HTTP error calling {endpoint}: {source}")]
    Http {
        endpoint: String,
        source: reqwest::Error,
    },
    /// The backend answered with a non-2xx status. `body` is the backend's
    /// own error text.
    #[error("storage backend {endpoint} returned {status}: {body}")]
    Api {
        endpoint: String,
        status: u16,
        body: String,
    },
    /// The backend could not complete the operation.
    #[error("storage backend unavailable: {0}")]
    Unavailable(String),
    /// No object is stored under the locator.
    #[error("object not found: {0}")]
    NotFound(String),
    /// Building a content identifier failed.
    #[error("content identifier error: {0}")]
    ContentIdentifier(String),
    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),
}

impl StorageError {
    /// Whether the error means the object does not exist.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }
}
