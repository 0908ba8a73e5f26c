//! Typed client for the identity service.
//!
//! The identity service maps organisation chain addresses to human aliases,
//! reports the local organisation (`/v1/self`) and publishes the federation
//! profile of every peer (`/v1/members/{address}/org-data`).

use std::sync::Arc;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::config::ConfigError;
use crate::error::FederationError;
use crate::token::ServiceTokenSource;

/// An organisation known to the identity service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Member {
    pub address: String,
    pub alias: String,
}

/// Where and how to fetch attachments from a peer organisation.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PeerOrgProfile {
    /// Chain account of the peer.
    pub account: String,
    /// Base URL of the peer's attachment API.
    pub attachment_endpoint_address: String,
    /// URL of the peer IdP's OIDC discovery document.
    pub oidc_configuration_endpoint_address: String,
}

/// Identity service health document.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct IdentityHealth {
    pub version: String,
    pub status: String,
}

impl IdentityHealth {
    /// Healthy when the status is `ok` and the version looks like `x.y.z`.
    pub fn is_healthy(&self) -> bool {
        let parts: Vec<&str> = self.version.split('.').collect();
        self.status == "ok"
            && parts.len() >= 3
            && parts[..3]
                .iter()
                .all(|p| !p.is_empty() && p.bytes().take_while(u8::is_ascii_digit).count() > 0)
    }
}

/// Lookups against the identity service.
#[async_trait]
pub trait IdentityDirectory: Send + Sync {
    /// The local organisation.
    async fn self_member(&self) -> Result<Member, FederationError>;

    /// Resolve an alias (or address) to a member.
    async fn member_by_alias(&self, alias: &str) -> Result<Member, FederationError>;

    /// Resolve an address to a member.
    async fn member_by_address(&self, address: &str) -> Result<Member, FederationError> {
        self.member_by_alias(address).await
    }

    /// Federation profile of a peer organisation. Never cached.
    async fn org_profile(&self, address: &str) -> Result<PeerOrgProfile, FederationError>;

    /// Service health.
    async fn health(&self) -> Result<IdentityHealth, FederationError>;
}

/// HTTP client for the identity service.
#[derive(Clone)]
pub struct IdentityClient {
    http: reqwest::Client,
    base_url: url::Url,
    tokens: Arc<dyn ServiceTokenSource>,
}

impl std::fmt::Debug for IdentityClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IdentityClient")
            .field("base_url", &self.base_url)
            .finish()
    }
}

impl IdentityClient {
    /// Create a client for the service at `base_url`.
    pub fn new(
        http: reqwest::Client,
        base_url: url::Url,
        tokens: Arc<dyn ServiceTokenSource>,
    ) -> Self {
        Self {
            http,
            base_url,
            tokens,
        }
    }

    fn url(&self, segments: &[&str]) -> Result<url::Url, FederationError> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| {
                ConfigError::InvalidUrl(self.base_url.to_string(), "cannot be a base".into())
            })?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    /// Authenticated GET returning JSON. 404 becomes `IdentityNotFound(subject)`.
    async fn get_json<T: DeserializeOwned>(
        &self,
        endpoint: &str,
        segments: &[&str],
        subject: &str,
    ) -> Result<T, FederationError> {
        let url = self.url(segments)?;
        let token = self.tokens.access_token().await?;

        let resp = self
            .http
            .get(url)
            .bearer_auth(token.as_str())
            .send()
            .await
            .map_err(|e| FederationError::Http {
                endpoint: endpoint.into(),
                source: e,
            })?;

        if resp.status() == reqwest::StatusCode::NOT_FOUND {
            return Err(FederationError::IdentityNotFound(subject.to_string()));
        }
        if !resp.status().is_success() {
            let status = resp.status().as_u16();
            let body = resp.text().await.unwrap_or_default();
            return Err(FederationError::Api {
                endpoint: endpoint.into(),
                status,
                body,
            });
        }

        resp.json().await.map_err(|e| FederationError::Deserialization {
            endpoint: endpoint.into(),
            source: e,
        })
    }
}

#[async_trait]
impl IdentityDirectory for IdentityClient {
    async fn self_member(&self) -> Result<Member, FederationError> {
        self.get_json("GET /v1/self", &["v1", "self"], "self").await
    }

    async fn member_by_alias(&self, alias: &str) -> Result<Member, FederationError> {
        self.get_json("GET /v1/members/{alias}", &["v1", "members", alias], alias)
            .await
    }

    async fn org_profile(&self, address: &str) -> Result<PeerOrgProfile, FederationError> {
        self.get_json(
            "GET /v1/members/{address}/org-data",
            &["v1", "members", address, "org-data"],
            address,
        )
        .await
    }

    async fn health(&self) -> Result<IdentityHealth, FederationError> {
        let endpoint = "GET /health";
        let url = self.url(&["health"])?;
        let resp = self
            .http
            .get(url)
            .send()
            .await
            .map_err(|e| FederationError::Http {
                endpoint: endpoint.into(),
                source: e,
            })?;

        if !resp.status().is_success() {
            let status = resp.status().as_u16();
            let body = resp.text().await.unwrap_or_default();
            return Err(FederationError::Api {
                endpoint: endpoint.into(),
                status,
                body,
            });
        }
        resp.json().await.map_err(|e| FederationError::Deserialization {
            endpoint: endpoint.into(),
            source: e,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn health(version: &str, status: &str) -> IdentityHealth {
        IdentityHealth {
            version: version.into(),
            status: status.into(),
        }
    }

    #[test]
    fn health_requires_semver_and_ok() {
        assert!(health("1.2.3", "ok").is_healthy());
        assert!(health("10.0.1-rc.1", "ok").is_healthy());
        assert!(!health("1.2", "ok").is_healthy());
        assert!(!health("unknown", "ok").is_healthy());
        assert!(!health("1.2.3", "degraded").is_healthy());
    }
}
