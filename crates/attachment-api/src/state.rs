//! # Application State
//!
//! Configuration and the shared collaborators handed to every handler.

use std::sync::Arc;

use attachment_federation::{AccessAuthorizer, Federation, IdentityDirectory};
use attachment_storage::StorageBackend;

use crate::auth::SecretToken;
use crate::db::AttachmentStore;
use crate::resolver::AttachmentResolver;

/// Default upload ceiling: 100 MiB.
pub const DEFAULT_UPLOAD_LIMIT_BYTES: usize = 100 * 1024 * 1024;

/// HTTP server configuration.
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Port to bind the HTTP server to.
    pub port: u16,
    /// Shared bearer secret. If `None`, authentication is disabled.
    pub auth_token: Option<SecretToken>,
    /// Largest accepted request body.
    pub upload_limit_bytes: usize,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            port: 3000,
            auth_token: None,
            upload_limit_bytes: DEFAULT_UPLOAD_LIMIT_BYTES,
        }
    }
}

impl AppConfig {
    /// Load from `PORT`, `AUTH_TOKEN` and `UPLOAD_LIMIT_BYTES`.
    pub fn from_env() -> Result<Self, ConfigError> {
        let defaults = Self::default();
        Ok(Self {
            port: parse_or("PORT", defaults.port)?,
            auth_token: std::env::var("AUTH_TOKEN")
                .ok()
                .filter(|t| !t.is_empty())
                .map(SecretToken::new),
            upload_limit_bytes: parse_or("UPLOAD_LIMIT_BYTES", defaults.upload_limit_bytes)?,
        })
    }
}

fn parse_or<T: std::str::FromStr>(var: &str, default: T) -> Result<T, ConfigError> {
    match std::env::var(var) {
        Ok(raw) => raw
            .parse()
            .map_err(|_| ConfigError::InvalidValue(var.to_string(), raw)),
        Err(_) => Ok(default),
    }
}

/// API configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid value for {0}: {1:?}")]
    InvalidValue(String, String),
}

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub config: AppConfig,
    pub metadata: Arc<dyn AttachmentStore>,
    pub storage: Arc<dyn StorageBackend>,
    pub identity: Arc<dyn IdentityDirectory>,
    pub authorizer: Arc<AccessAuthorizer>,
    pub resolver: Arc<AttachmentResolver>,
}

impl AppState {
    /// Wire the collaborators together.
    pub fn new(
        config: AppConfig,
        metadata: Arc<dyn AttachmentStore>,
        storage: Arc<dyn StorageBackend>,
        federation: Federation,
    ) -> Self {
        let resolver = Arc::new(AttachmentResolver::new(
            storage.clone(),
            federation.peers,
            metadata.clone(),
        ));
        Self {
            config,
            metadata,
            storage,
            identity: federation.identity,
            authorizer: federation.authorizer,
            resolver,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_or_falls_back_and_reports() {
        assert_eq!(
            parse_or::<u16>("ATTACHMENT_API_TEST_UNSET_PORT", 3000).unwrap(),
            3000
        );
        std::env::set_var("ATTACHMENT_API_TEST_BAD_PORT", "eighty");
        let err = parse_or::<u16>("ATTACHMENT_API_TEST_BAD_PORT", 3000).unwrap_err();
        assert!(err.to_string().contains("ATTACHMENT_API_TEST_BAD_PORT"));
    }

    #[test]
    fn debug_hides_auth_token() {
        let config = AppConfig {
            auth_token: Some(SecretToken::new("hunter2")),
            ..AppConfig::default()
        };
        assert!(!format!("{config:?}").contains("hunter2"));
    }
}
