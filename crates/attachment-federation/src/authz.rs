//! Access authorization for external callers.
//!
//! Calls from other organisations are checked against a policy webhook.
//! Every failure mode collapses into [`AccessDenied`]; the cause is logged.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::token::ServiceTokenSource;

/// The webhook refused, failed, or is not configured.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("access to attachment {resource_id} denied for {account}")]
pub struct AccessDenied {
    pub resource_id: Uuid,
    pub account: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct PolicyInput<'a> {
    resource_type: &'static str,
    resource_id: Uuid,
    account_address: &'a str,
}

#[derive(Serialize)]
struct PolicyRequest<'a> {
    input: PolicyInput<'a>,
}

#[derive(Deserialize)]
struct PolicyResult {
    allow: bool,
}

#[derive(Deserialize)]
struct PolicyResponse {
    result: PolicyResult,
}

/// Policy webhook client.
#[derive(Clone)]
pub struct AccessAuthorizer {
    http: reqwest::Client,
    webhook: Option<url::Url>,
    tokens: Arc<dyn ServiceTokenSource>,
}

impl std::fmt::Debug for AccessAuthorizer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AccessAuthorizer")
            .field("webhook", &self.webhook)
            .finish()
    }
}

impl AccessAuthorizer {
    /// Create an authorizer. Without a webhook every request is denied.
    pub fn new(
        http: reqwest::Client,
        webhook: Option<url::Url>,
        tokens: Arc<dyn ServiceTokenSource>,
    ) -> Self {
        if webhook.is_none() {
            tracing::warn!("no authorization webhook configured; external access is denied");
        }
        Self {
            http,
            webhook,
            tokens,
        }
    }

    /// Whether a webhook is configured.
    pub fn is_configured(&self) -> bool {
        self.webhook.is_some()
    }

    /// Allow `account` to read attachment `resource_id`, or deny.
    pub async fn authorize(&self, resource_id: Uuid, account: &str) -> Result<(), AccessDenied> {
        let denied = || AccessDenied {
            resource_id,
            account: account.to_string(),
        };

        let Some(webhook) = &self.webhook else {
            return Err(denied());
        };

        let token = self.tokens.access_token().await.map_err(|e| {
            tracing::error!(error = %e, "could not obtain token for authorization webhook");
            denied()
        })?;

        let request = PolicyRequest {
            input: PolicyInput {
                resource_type: "attachment",
                resource_id,
                account_address: account,
            },
        };
        let resp = self
            .http
            .post(webhook.clone())
            .bearer_auth(token.as_str())
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                tracing::error!(error = %e, "authorization webhook unreachable");
                denied()
            })?;

        let status = resp.status();
        if status.is_server_error() {
            tracing::error!(status = status.as_u16(), "authorization webhook failed");
            return Err(denied());
        }
        if !status.is_success() {
            tracing::debug!(status = status.as_u16(), "authorization webhook refused");
            return Err(denied());
        }

        let body: PolicyResponse = resp.json().await.map_err(|e| {
            tracing::warn!(error = %e, "malformed authorization webhook response");
            denied()
        })?;

        if body.result.allow {
            Ok(())
        } else {
            tracing::debug!(%resource_id, account, "access denied by policy");
            Err(denied())
        }
    }
}
