//! Federation error types.

use crate::config::ConfigError;

/// Errors from identity, token, credential and peer operations.
#[derive(Debug, thiserror::Error)]
pub enum FederationError {
    /// HTTP transport error.
    #[error("HTTP error calling {endpoint}: {source}")]
    Http {
        endpoint: String,
        source: reqwest::Error,
    },
    /// A collaborator returned a non-2xx status.
    #[error("{endpoint} returned {status}: {body}")]
    Api {
        endpoint: String,
        status: u16,
        body: String,
    },
    /// Response deserialization failed.
    #[error("failed to deserialize response from {endpoint}: {source}")]
    Deserialization {
        endpoint: String,
        source: reqwest::Error,
    },
    /// The identity service does not know the member.
    #[error("identity not found: {0}")]
    IdentityNotFound(String),
    /// The peer's OIDC discovery document could not be fetched or parsed.
    #[error("OIDC discovery at {url} failed: {reason}")]
    OidcDiscoveryFailed { url: String, reason: String },
    /// No federation credentials exist for the organisation.
    #[error("no federation credentials for organisation {owner}")]
    NoCredentials { owner: String },
    /// The credential directory file could not be read or parsed.
    #[error("credential directory {path} unavailable: {reason}")]
    CredentialsUnavailable { path: String, reason: String },
    /// The client-credentials grant was refused or malformed.
    #[error("token exchange at {endpoint} failed: {reason}")]
    TokenExchangeFailed { endpoint: String, reason: String },
    /// The peer refused to serve the attachment.
    #[error("peer fetch from {url} failed with status {status}")]
    PeerFetchFailed { url: String, status: u16 },
    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),
}
