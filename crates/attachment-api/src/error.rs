//! # API Error Types
//!
//! Structured error type implementing `axum::response::IntoResponse`.
//! Maps storage, federation, metadata and resolution errors to HTTP status
//! codes with a JSON body of error code and message. Server-side failures
//! are logged and answered with a generic message.

use attachment_core::HashError;
use attachment_federation::{AccessDenied, FederationError};
use attachment_storage::StorageError;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use utoipa::ToSchema;

use crate::db::MetadataError;
use crate::resolver::ResolveError;

/// Structured JSON error response body.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ErrorBody {
    pub error: ErrorDetail,
}

/// Inner error detail.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ErrorDetail {
    /// Machine-readable error code (e.g., "NOT_FOUND", "BAD_REQUEST").
    pub code: String,
    /// Human-readable error message.
    pub message: String,
    /// Additional details, present only for client errors.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

/// Application-level error type that implements [`IntoResponse`] for Axum.
#[derive(Error, Debug)]
pub enum AppError {
    /// Resource not found (404).
    #[error("not found: {0}")]
    NotFound(String),

    /// Request could not be parsed or failed a check (400).
    #[error("bad request: {0}")]
    BadRequest(String),

    /// Missing or invalid token (401).
    #[error("unauthorized: {0}")]
    Unauthorized(String),

    /// Authorization failure (403).
    #[error("forbidden: {0}")]
    Forbidden(String),

    /// Upload exceeds the configured limit (413).
    #[error("payload too large: {0}")]
    PayloadTooLarge(String),

    /// Internal server error (500). Message is logged but not returned to client.
    #[error("internal error: {0}")]
    Internal(String),

    /// Identity lookup failed unexpectedly while shaping a response (500).
    #[error("unknown error: {0}")]
    Unknown(String),

    /// A peer or collaborator answered badly (502).
    #[error("upstream error: {0}")]
    UpstreamError(String),

    /// Storage or another dependency is unreachable (503).
    #[error("service unavailable: {0}")]
    ServiceUnavailable(String),
}

impl AppError {
    /// Return the HTTP status code and machine-readable error code for this error.
    fn status_and_code(&self) -> (StatusCode, &'static str) {
        match self {
            Self::NotFound(_) => (StatusCode::NOT_FOUND, "NOT_FOUND"),
            Self::BadRequest(_) => (StatusCode::BAD_REQUEST, "BAD_REQUEST"),
            Self::Unauthorized(_) => (StatusCode::UNAUTHORIZED, "UNAUTHORIZED"),
            Self::Forbidden(_) => (StatusCode::FORBIDDEN, "FORBIDDEN"),
            Self::PayloadTooLarge(_) => (StatusCode::PAYLOAD_TOO_LARGE, "PAYLOAD_TOO_LARGE"),
            Self::Internal(_) => (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR"),
            Self::Unknown(_) => (StatusCode::INTERNAL_SERVER_ERROR, "UNKNOWN_ERROR"),
            Self::UpstreamError(_) => (StatusCode::BAD_GATEWAY, "UPSTREAM_ERROR"),
            Self::ServiceUnavailable(_) => (StatusCode::SERVICE_UNAVAILABLE, "SERVICE_UNAVAILABLE"),
        }
    }

    fn public_message(&self) -> String {
        match self {
            Self::Internal(_) => "An internal error occurred".to_string(),
            Self::Unknown(_) => "An unknown error occurred".to_string(),
            Self::UpstreamError(_) => "An upstream service failed".to_string(),
            Self::ServiceUnavailable(_) => "A dependency is unavailable".to_string(),
            other => other.to_string(),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code) = self.status_and_code();

        if status.is_server_error() {
            tracing::error!(error = %self, status = status.as_u16(), "request failed");
        }

        let body = ErrorBody {
            error: ErrorDetail {
                code: code.to_string(),
                message: self.public_message(),
                details: None,
            },
        };

        (status, Json(body)).into_response()
    }
}

impl From<HashError> for AppError {
    fn from(err: HashError) -> Self {
        Self::BadRequest(err.to_string())
    }
}

impl From<AccessDenied> for AppError {
    fn from(_: AccessDenied) -> Self {
        Self::Forbidden("access denied".into())
    }
}

impl From<MetadataError> for AppError {
    fn from(err: MetadataError) -> Self {
        Self::Internal(err.to_string())
    }
}

impl From<StorageError> for AppError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::NotFound(locator) => Self::NotFound(format!("content {locator}")),
            StorageError::ContentIdentifier(_) | StorageError::Config(_) => {
                Self::Internal(err.to_string())
            }
            StorageError::Http { .. } | StorageError::Api { .. } | StorageError::Unavailable(_) => {
                Self::ServiceUnavailable(err.to_string())
            }
        }
    }
}

impl From<FederationError> for AppError {
    fn from(err: FederationError) -> Self {
        match err {
            FederationError::IdentityNotFound(subject) => {
                Self::NotFound(format!("identity {subject}"))
            }
            FederationError::CredentialsUnavailable { .. } | FederationError::Config(_) => {
                Self::Internal(err.to_string())
            }
            FederationError::Http { .. }
            | FederationError::Api { .. }
            | FederationError::Deserialization { .. }
            | FederationError::OidcDiscoveryFailed { .. }
            | FederationError::NoCredentials { .. }
            | FederationError::TokenExchangeFailed { .. }
            | FederationError::PeerFetchFailed { .. } => Self::UpstreamError(err.to_string()),
        }
    }
}

impl From<ResolveError> for AppError {
    fn from(err: ResolveError) -> Self {
        match err {
            ResolveError::NotFound(locator) => Self::NotFound(format!("content {locator}")),
            ResolveError::IntegrityCheckFailed { .. } | ResolveError::Hash(_) => {
                Self::BadRequest(err.to_string())
            }
            ResolveError::UnknownFilename(_) => Self::UpstreamError(err.to_string()),
            ResolveError::Storage(e) => e.into(),
            ResolveError::Federation(e) => e.into(),
            ResolveError::Internal(_) => Self::Internal(err.to_string()),
        }
    }
}
