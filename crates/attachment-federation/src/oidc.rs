//! OIDC discovery and the client-credentials grant.

use serde::Deserialize;
use zeroize::Zeroizing;

use crate::error::FederationError;

/// The subset of an OIDC discovery document this service needs.
#[derive(Debug, Clone, Deserialize)]
pub struct OidcConfiguration {
    pub token_endpoint: url::Url,
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
}

/// Fetch an OIDC discovery document.
///
/// Any transport failure, non-2xx answer or unparsable body is
/// [`FederationError::OidcDiscoveryFailed`].
pub async fn discover(
    http: &reqwest::Client,
    url: &str,
) -> Result<OidcConfiguration, FederationError> {
    let failed = |reason: String| FederationError::OidcDiscoveryFailed {
        url: url.to_string(),
        reason,
    };

    let resp = http.get(url).send().await.map_err(|e| failed(e.to_string()))?;
    if !resp.status().is_success() {
        return Err(failed(format!("status {}", resp.status().as_u16())));
    }
    resp.json().await.map_err(|e| failed(e.to_string()))
}

/// Exchange client credentials for an access token.
///
/// The request is form-encoded. Non-2xx answers and bodies without an
/// `access_token` are [`FederationError::TokenExchangeFailed`]; transport
/// errors are [`FederationError::Http`].
pub async fn client_credentials(
    http: &reqwest::Client,
    token_endpoint: &str,
    client_id: &str,
    client_secret: &str,
) -> Result<Zeroizing<String>, FederationError> {
    let resp = http
        .post(token_endpoint)
        .form(&[
            ("grant_type", "client_credentials"),
            ("client_id", client_id),
            ("client_secret", client_secret),
        ])
        .send()
        .await
        .map_err(|e| FederationError::Http {
            endpoint: token_endpoint.to_string(),
            source: e,
        })?;

    if !resp.status().is_success() {
        return Err(FederationError::TokenExchangeFailed {
            endpoint: token_endpoint.to_string(),
            reason: format!("status {}", resp.status().as_u16()),
        });
    }

    let body: TokenResponse = resp
        .json()
        .await
        .map_err(|e| FederationError::TokenExchangeFailed {
            endpoint: token_endpoint.to_string(),
            reason: e.to_string(),
        })?;
    Ok(Zeroizing::new(body.access_token))
}
