//! # attachment-federation
//!
//! Everything the attachment service needs from other services and other
//! organisations:
//!
//! - [`identity`]: the identity directory (aliases, self, peer profiles).
//! - [`token`]: service tokens for internal calls.
//! - [`credentials`]: per-peer client credentials read from a JSON file.
//! - [`peer`]: OIDC-authenticated fetch from a peer's attachment endpoint.
//! - [`authz`]: the policy webhook gating external callers.
//!
//! [`Federation::from_config`] wires them together around a single
//! `reqwest::Client`.

pub mod authz;
pub mod config;
pub mod credentials;
pub mod error;
pub mod identity;
pub mod oidc;
pub mod peer;
pub mod token;

pub use authz::{AccessAuthorizer, AccessDenied};
pub use config::{ConfigError, FederationConfig};
pub use credentials::{Credential, CredentialDirectory};
pub use error::FederationError;
pub use identity::{IdentityClient, IdentityDirectory, IdentityHealth, Member, PeerOrgProfile};
pub use peer::{PeerAttachment, PeerAttachmentSource, PeerFederationClient};
pub use token::{ClientCredentialsTokenSource, ServiceTokenSource, StaticTokenSource};

use std::sync::Arc;
use std::time::Duration;

/// The federation collaborators of one service instance.
#[derive(Clone)]
pub struct Federation {
    pub identity: Arc<dyn IdentityDirectory>,
    pub peers: Arc<dyn PeerAttachmentSource>,
    pub authorizer: Arc<AccessAuthorizer>,
}

impl Federation {
    /// Build the collaborators described by `config`.
    pub fn from_config(config: &FederationConfig) -> Result<Self, FederationError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| FederationError::Http {
                endpoint: "client_init".into(),
                source: e,
            })?;

        let tokens: Arc<dyn ServiceTokenSource> = Arc::new(ClientCredentialsTokenSource::new(
            http.clone(),
            config.token_endpoint.clone(),
            config.client_id.clone(),
            config.client_secret.clone(),
        ));
        let identity: Arc<dyn IdentityDirectory> = Arc::new(IdentityClient::new(
            http.clone(),
            config.identity_url.clone(),
            tokens.clone(),
        ));
        let credentials = Arc::new(CredentialDirectory::new(config.credentials_path.clone()));
        let peers = Arc::new(PeerFederationClient::new(
            http.clone(),
            identity.clone(),
            credentials,
        ));
        let authorizer = Arc::new(AccessAuthorizer::new(
            http,
            config.authz_webhook.clone(),
            tokens,
        ));

        Ok(Self {
            identity,
            peers,
            authorizer,
        })
    }
}
