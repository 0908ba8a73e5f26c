//! Service-to-service access tokens.
//!
//! Calls to the identity service and the authorization webhook carry a
//! bearer token from the internal IdP realm. A token is requested per call.

use std::sync::Arc;

use async_trait::async_trait;
use zeroize::Zeroizing;

use crate::error::FederationError;
use crate::oidc;

/// Source of bearer tokens for internal calls.
#[async_trait]
pub trait ServiceTokenSource: Send + Sync {
    /// Obtain a token.
    async fn access_token(&self) -> Result<Zeroizing<String>, FederationError>;
}

/// Client-credentials grant against the internal realm.
#[derive(Clone)]
pub struct ClientCredentialsTokenSource {
    http: reqwest::Client,
    token_endpoint: url::Url,
    client_id: String,
    client_secret: Zeroizing<String>,
}

impl std::fmt::Debug for ClientCredentialsTokenSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientCredentialsTokenSource")
            .field("token_endpoint", &self.token_endpoint)
            .field("client_id", &self.client_id)
            .field("client_secret", &"[REDACTED]")
            .finish()
    }
}

impl ClientCredentialsTokenSource {
    /// Create a token source.
    pub fn new(
        http: reqwest::Client,
        token_endpoint: url::Url,
        client_id: impl Into<String>,
        client_secret: Zeroizing<String>,
    ) -> Self {
        Self {
            http,
            token_endpoint,
            client_id: client_id.into(),
            client_secret,
        }
    }
}

#[async_trait]
impl ServiceTokenSource for ClientCredentialsTokenSource {
    async fn access_token(&self) -> Result<Zeroizing<String>, FederationError> {
        oidc::client_credentials(
            &self.http,
            self.token_endpoint.as_str(),
            &self.client_id,
            &self.client_secret,
        )
        .await
    }
}

/// Fixed token, for tests and local development.
#[derive(Clone)]
pub struct StaticTokenSource(Zeroizing<String>);

impl StaticTokenSource {
    /// Wrap a token.
    pub fn new(token: impl Into<String>) -> Arc<Self> {
        Arc::new(Self(Zeroizing::new(token.into())))
    }
}

#[async_trait]
impl ServiceTokenSource for StaticTokenSource {
    async fn access_token(&self) -> Result<Zeroizing<String>, FederationError> {
        Ok(self.0.clone())
    }
}
