//! Peer federation: discovery, client-credentials grant and fetch.

use std::sync::Arc;

use attachment_federation::{
    Credential, CredentialDirectory, FederationError, IdentityClient, PeerAttachmentSource,
    PeerFederationClient, StaticTokenSource,
};
use wiremock::matchers::{body_string_contains, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};
use zeroize::Zeroizing;

const HASH: &str = "2cf24dba5fb0a30e26e83b2ac5b9e29e1b161e5c1fa7425e73043362938b9824";

fn credentials() -> Arc<CredentialDirectory> {
    Arc::new(CredentialDirectory::from_credentials(vec![Credential {
        client_id: "fed-client".into(),
        client_secret: Zeroizing::new("fed-secret".into()),
        organization_id: "0xpeer".into(),
    }]))
}

fn client_for(identity: &MockServer, credentials: Arc<CredentialDirectory>) -> PeerFederationClient {
    let http = reqwest::Client::new();
    let identity = Arc::new(IdentityClient::new(
        http.clone(),
        identity.uri().parse().unwrap(),
        StaticTokenSource::new("internal-token"),
    ));
    PeerFederationClient::new(http, identity, credentials)
}

async fn mount_profile(identity: &MockServer, peer: &MockServer) {
    Mock::given(method("GET"))
        .and(path("/v1/members/0xpeer/org-data"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "account": "0xpeer",
            "attachmentEndpointAddress": format!("{}/v1", peer.uri()),
            "oidcConfigurationEndpointAddress": format!("{}/oidc/.well-known/openid-configuration", peer.uri())
        })))
        .mount(identity)
        .await;
}

async fn mount_idp(peer: &MockServer) {
    Mock::given(method("GET"))
        .and(path("/oidc/.well-known/openid-configuration"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "issuer": format!("{}/oidc", peer.uri()),
            "token_endpoint": format!("{}/oidc/token", peer.uri())
        })))
        .mount(peer)
        .await;
    Mock::given(method("POST"))
        .and(path("/oidc/token"))
        .and(body_string_contains("grant_type=client_credentials"))
        .and(body_string_contains("client_id=fed-client"))
        .and(body_string_contains("client_secret=fed-secret"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "access_token": "peer-token",
            "token_type": "Bearer",
            "expires_in": 300
        })))
        .mount(peer)
        .await;
}

#[tokio::test]
async fn fetches_with_peer_token_and_reads_disposition() {
    let identity = MockServer::start().await;
    let peer = MockServer::start().await;
    mount_profile(&identity, &peer).await;
    mount_idp(&peer).await;
    Mock::given(method("GET"))
        .and(path(format!("/v1/attachment/{HASH}")))
        .and(header("authorization", "Bearer peer-token"))
        .and(header("accept", "application/octet-stream"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("content-disposition", "attachment; filename=\"hello.txt\"")
                .set_body_bytes(b"hello".to_vec()),
        )
        .expect(1)
        .mount(&peer)
        .await;

    let fetched = client_for(&identity, credentials())
        .fetch("0xpeer", HASH)
        .await
        .unwrap();
    assert_eq!(fetched.bytes, b"hello");
    assert_eq!(fetched.filename.as_deref(), Some("hello.txt"));
}

#[tokio::test]
async fn discovery_failure_is_reported() {
    let identity = MockServer::start().await;
    let peer = MockServer::start().await;
    mount_profile(&identity, &peer).await;
    Mock::given(method("GET"))
        .and(path("/oidc/.well-known/openid-configuration"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&peer)
        .await;

    let err = client_for(&identity, credentials())
        .fetch("0xpeer", HASH)
        .await
        .unwrap_err();
    assert!(matches!(err, FederationError::OidcDiscoveryFailed { .. }));
}

#[tokio::test]
async fn missing_credentials_stop_before_token_exchange() {
    let identity = MockServer::start().await;
    let peer = MockServer::start().await;
    mount_profile(&identity, &peer).await;
    mount_idp(&peer).await;

    let empty = Arc::new(CredentialDirectory::from_credentials(Vec::new()));
    let err = client_for(&identity, empty)
        .fetch("0xpeer", HASH)
        .await
        .unwrap_err();
    assert!(matches!(err, FederationError::NoCredentials { owner } if owner == "0xpeer"));
}

#[tokio::test]
async fn rejected_grant_is_token_exchange_failure() {
    let identity = MockServer::start().await;
    let peer = MockServer::start().await;
    mount_profile(&identity, &peer).await;
    Mock::given(method("GET"))
        .and(path("/oidc/.well-known/openid-configuration"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "token_endpoint": format!("{}/oidc/token", peer.uri())
        })))
        .mount(&peer)
        .await;
    Mock::given(method("POST"))
        .and(path("/oidc/token"))
        .respond_with(ResponseTemplate::new(401).set_body_string("invalid_client"))
        .mount(&peer)
        .await;

    let err = client_for(&identity, credentials())
        .fetch("0xpeer", HASH)
        .await
        .unwrap_err();
    assert!(matches!(err, FederationError::TokenExchangeFailed { .. }));
}

#[tokio::test]
async fn peer_refusal_is_peer_fetch_failure() {
    let identity = MockServer::start().await;
    let peer = MockServer::start().await;
    mount_profile(&identity, &peer).await;
    mount_idp(&peer).await;
    Mock::given(method("GET"))
        .and(path(format!("/v1/attachment/{HASH}")))
        .respond_with(ResponseTemplate::new(403))
        .mount(&peer)
        .await;

    let err = client_for(&identity, credentials())
        .fetch("0xpeer", HASH)
        .await
        .unwrap_err();
    assert!(matches!(err, FederationError::PeerFetchFailed { status: 403, .. }));
}
