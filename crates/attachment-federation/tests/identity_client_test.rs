//! Identity directory client against a mocked identity service.

use attachment_federation::{
    FederationError, IdentityClient, IdentityDirectory, StaticTokenSource,
};
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn client_for(server: &MockServer) -> IdentityClient {
    IdentityClient::new(
        reqwest::Client::new(),
        server.uri().parse().unwrap(),
        StaticTokenSource::new("internal-token"),
    )
}

#[tokio::test]
async fn self_member_sends_service_token() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v1/self"))
        .and(header("authorization", "Bearer internal-token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "address": "0xself",
            "alias": "self-org"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let me = client_for(&server).self_member().await.unwrap();
    assert_eq!(me.address, "0xself");
    assert_eq!(me.alias, "self-org");
}

#[tokio::test]
async fn unknown_alias_is_identity_not_found() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v1/members/ghost"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let err = client_for(&server).member_by_alias("ghost").await.unwrap_err();
    assert!(matches!(err, FederationError::IdentityNotFound(alias) if alias == "ghost"));
}

#[tokio::test]
async fn member_by_address_uses_members_endpoint() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v1/members/0xpeer"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "address": "0xpeer",
            "alias": "peer-org"
        })))
        .mount(&server)
        .await;

    let member = client_for(&server).member_by_address("0xpeer").await.unwrap();
    assert_eq!(member.alias, "peer-org");
}

#[tokio::test]
async fn org_profile_is_camel_case() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v1/members/0xpeer/org-data"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "account": "0xpeer",
            "attachmentEndpointAddress": "https://peer.example/v1",
            "oidcConfigurationEndpointAddress": "https://idp.peer.example/.well-known/openid-configuration"
        })))
        .mount(&server)
        .await;

    let profile = client_for(&server).org_profile("0xpeer").await.unwrap();
    assert_eq!(profile.account, "0xpeer");
    assert_eq!(profile.attachment_endpoint_address, "https://peer.example/v1");
}

#[tokio::test]
async fn server_error_keeps_body() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v1/self"))
        .respond_with(ResponseTemplate::new(500).set_body_string("db down"))
        .mount(&server)
        .await;

    match client_for(&server).self_member().await.unwrap_err() {
        FederationError::Api { status, body, .. } => {
            assert_eq!(status, 500);
            assert_eq!(body, "db down");
        }
        other => panic!("expected Api error, got {other:?}"),
    }
}

#[tokio::test]
async fn health_reports_version() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/health"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "version": "2.4.1",
            "status": "ok"
        })))
        .mount(&server)
        .await;

    let health = client_for(&server).health().await.unwrap();
    assert!(health.is_healthy());
}
