//! Peer federation: fetching attachments owned by another organisation.
//!
//! For every request the peer's profile is looked up fresh, the peer IdP's
//! discovery document is fetched, a token is obtained with the credentials
//! registered for that peer, and the bytes are downloaded from the peer's
//! attachment endpoint. Nothing is retried.

use std::sync::Arc;

use async_trait::async_trait;
use reqwest::header::{ACCEPT, CONTENT_DISPOSITION};

use attachment_core::filename_from_disposition;

use crate::credentials::CredentialDirectory;
use crate::error::FederationError;
use crate::identity::IdentityDirectory;
use crate::oidc;

/// Bytes served by a peer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PeerAttachment {
    pub bytes: Vec<u8>,
    /// Filename from the peer's `Content-Disposition`, if any.
    pub filename: Option<String>,
}

/// Source of attachments held by other organisations.
#[async_trait]
pub trait PeerAttachmentSource: Send + Sync {
    /// Fetch the attachment `integrity_hash` from the organisation `owner`.
    async fn fetch(
        &self,
        owner: &str,
        integrity_hash: &str,
    ) -> Result<PeerAttachment, FederationError>;
}

/// OIDC-authenticated peer fetch.
#[derive(Clone)]
pub struct PeerFederationClient {
    http: reqwest::Client,
    identity: Arc<dyn IdentityDirectory>,
    credentials: Arc<CredentialDirectory>,
}

impl std::fmt::Debug for PeerFederationClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PeerFederationClient")
            .field("credentials", &self.credentials.path())
            .finish()
    }
}

impl PeerFederationClient {
    pub fn new(
        http: reqwest::Client,
        identity: Arc<dyn IdentityDirectory>,
        credentials: Arc<CredentialDirectory>,
    ) -> Self {
        Self {
            http,
            identity,
            credentials,
        }
    }
}

#[async_trait]
impl PeerAttachmentSource for PeerFederationClient {
    async fn fetch(
        &self,
        owner: &str,
        integrity_hash: &str,
    ) -> Result<PeerAttachment, FederationError> {
        let profile = self.identity.org_profile(owner).await?;
        let discovery =
            oidc::discover(&self.http, &profile.oidc_configuration_endpoint_address).await?;
        let credential = self.credentials.lookup(owner).await?;
        let token = oidc::client_credentials(
            &self.http,
            discovery.token_endpoint.as_str(),
            &credential.client_id,
            &credential.client_secret,
        )
        .await?;

        let url = format!(
            "{}/attachment/{integrity_hash}",
            profile.attachment_endpoint_address.trim_end_matches('/')
        );
        tracing::debug!(owner, url = %url, "fetching attachment from peer");

        let resp = self
            .http
            .get(&url)
            .bearer_auth(token.as_str())
            .header(ACCEPT, "application/octet-stream")
            .send()
            .await
            .map_err(|e| {
                tracing::error!(owner, url = %url, error = %e, "peer request failed");
                FederationError::Http {
                    endpoint: url.clone(),
                    source: e,
                }
            })?;

        if !resp.status().is_success() {
            let status = resp.status().as_u16();
            tracing::warn!(owner, url = %url, status, "peer refused attachment");
            return Err(FederationError::PeerFetchFailed { url, status });
        }

        let filename = resp
            .headers()
            .get(CONTENT_DISPOSITION)
            .and_then(|v| v.to_str().ok())
            .and_then(filename_from_disposition);
        let bytes = resp.bytes().await.map_err(|e| {
            tracing::error!(owner, url = %url, error = %e, "peer body read failed");
            FederationError::Http {
                endpoint: url.clone(),
                source: e,
            }
        })?;

        Ok(PeerAttachment {
            bytes: bytes.to_vec(),
            filename,
        })
    }
}
