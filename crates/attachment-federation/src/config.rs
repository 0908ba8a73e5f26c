//! Federation configuration.

use std::path::PathBuf;

use url::Url;
use zeroize::Zeroizing;

/// Settings for the identity service, the internal IdP, the authorization
/// webhook and the credential directory.
///
/// Custom `Debug` redacts the client secret.
#[derive(Clone)]
pub struct FederationConfig {
    /// Identity service base URL.
    pub identity_url: Url,
    /// Internal realm token endpoint used for service-to-service calls.
    pub token_endpoint: Url,
    /// Internal client id.
    pub client_id: String,
    /// Internal client secret.
    pub client_secret: Zeroizing<String>,
    /// Authorization webhook. `None` denies every external caller.
    pub authz_webhook: Option<Url>,
    /// Path of the federation credential directory file.
    pub credentials_path: PathBuf,
    /// Request timeout in seconds.
    pub timeout_secs: u64,
}

impl std::fmt::Debug for FederationConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FederationConfig")
            .field("identity_url", &self.identity_url)
            .field("token_endpoint", &self.token_endpoint)
            .field("client_id", &self.client_id)
            .field("client_secret", &"[REDACTED]")
            .field("authz_webhook", &self.authz_webhook)
            .field("credentials_path", &self.credentials_path)
            .field("timeout_secs", &self.timeout_secs)
            .finish()
    }
}

impl FederationConfig {
    /// Load configuration from environment variables.
    ///
    /// Variables:
    /// - `IDENTITY_SERVICE_HOST` (default: `localhost`), `IDENTITY_SERVICE_PORT` (default: 3000)
    /// - `IDP_INTERNAL_ORIGIN` (default: `http://localhost:3080`)
    /// - `IDP_PATH_PREFIX` (default: `/auth`)
    /// - `IDP_INTERNAL_REALM` (default: `internal`)
    /// - `IDP_INTERNAL_CLIENT_ID`, `IDP_INTERNAL_CLIENT_SECRET` (required)
    /// - `AUTHZ_WEBHOOK` (optional)
    /// - `CREDENTIALS_FILE_PATH` (default: `config/credentials.json`)
    /// - `HTTP_TIMEOUT_SECS` (default: 30)
    pub fn from_env() -> Result<Self, ConfigError> {
        let identity_url = parse_url(
            "IDENTITY_SERVICE_HOST",
            &format!(
                "http://{}:{}",
                env_or("IDENTITY_SERVICE_HOST", "localhost"),
                env_or("IDENTITY_SERVICE_PORT", "3000")
            ),
        )?;

        let token_endpoint = parse_url(
            "IDP_INTERNAL_ORIGIN",
            &token_endpoint_url(
                &env_or("IDP_INTERNAL_ORIGIN", "http://localhost:3080"),
                &env_or("IDP_PATH_PREFIX", "/auth"),
                &env_or("IDP_INTERNAL_REALM", "internal"),
            ),
        )?;

        let authz_webhook = match std::env::var("AUTHZ_WEBHOOK") {
            Ok(raw) if !raw.trim().is_empty() => Some(parse_url("AUTHZ_WEBHOOK", raw.trim())?),
            _ => None,
        };

        Ok(Self {
            identity_url,
            token_endpoint,
            client_id: required("IDP_INTERNAL_CLIENT_ID")?,
            client_secret: Zeroizing::new(required("IDP_INTERNAL_CLIENT_SECRET")?),
            authz_webhook,
            credentials_path: PathBuf::from(env_or(
                "CREDENTIALS_FILE_PATH",
                "config/credentials.json",
            )),
            timeout_secs: env_or("HTTP_TIMEOUT_SECS", "30")
                .parse()
                .map_err(|_| ConfigError::InvalidValue("HTTP_TIMEOUT_SECS".into()))?,
        })
    }
}

/// Keycloak-style token endpoint for a realm.
pub fn token_endpoint_url(origin: &str, path_prefix: &str, realm: &str) -> String {
    format!(
        "{}{}/realms/{realm}/protocol/openid-connect/token",
        origin.trim_end_matches('/'),
        path_prefix.trim_end_matches('/')
    )
}

fn env_or(var: &str, default: &str) -> String {
    std::env::var(var).unwrap_or_else(|_| default.to_string())
}

fn required(var: &str) -> Result<String, ConfigError> {
    std::env::var(var).map_err(|_| ConfigError::Missing(var.to_string()))
}

fn parse_url(var: &str, raw: &str) -> Result<Url, ConfigError> {
    Url::parse(raw).map_err(|e| ConfigError::InvalidUrl(var.to_string(), e.to_string()))
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{0} environment variable is required")]
    Missing(String),
    #[error("invalid URL for {0}: {1}")]
    InvalidUrl(String, String),
    #[error("invalid value for {0}")]
    InvalidValue(String),
}
