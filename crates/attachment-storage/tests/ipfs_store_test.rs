//! IPFS store against a mocked RPC API.

use attachment_storage::config::IpfsConfig;
use attachment_storage::ipfs::IpfsStore;
use attachment_storage::unixfs::wrapped_cid_v0;
use attachment_storage::{StorageBackend, StorageError};
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

const FILE_CID: &str = "QmZULkCELmmk5XNfCgTnCyFgAVxBRBXyDHGGMVoLFLiXEN";

fn store_for(server: &MockServer) -> IpfsStore {
    IpfsStore::new(&IpfsConfig {
        api_url: server.uri().parse().unwrap(),
        timeout_secs: 5,
    })
    .unwrap()
}

#[tokio::test]
async fn add_list_cat_round_trip() {
    let server = MockServer::start().await;
    let dir_cid = wrapped_cid_v0(b"hello", "greeting.txt").unwrap();

    let add_body = format!(
        "{{\"Name\":\"greeting.txt\",\"Hash\":\"{FILE_CID}\",\"Size\":\"13\"}}\n\
         {{\"Name\":\"\",\"Hash\":\"{dir_cid}\",\"Size\":\"71\"}}\n"
    );
    Mock::given(method("POST"))
        .and(path("/api/v0/add"))
        .and(query_param("cid-version", "0"))
        .and(query_param("wrap-with-directory", "true"))
        .respond_with(ResponseTemplate::new(200).set_body_string(add_body))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/v0/ls"))
        .and(query_param("arg", dir_cid.as_str()))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "Objects": [{
                "Hash": dir_cid,
                "Links": [{"Name": "greeting.txt", "Hash": FILE_CID, "Size": 5, "Type": 2}]
            }]
        })))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/v0/cat"))
        .and(query_param("arg", FILE_CID))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(b"hello".to_vec()))
        .mount(&server)
        .await;

    let store = store_for(&server);
    let locator = store.store(b"hello".to_vec(), "greeting.txt").await.unwrap();
    assert_eq!(locator, dir_cid);

    let object = store.retrieve(&locator).await.unwrap();
    assert_eq!(object.bytes, b"hello");
    assert_eq!(object.filename.as_deref(), Some("greeting.txt"));
    assert_eq!(store.verify(&object.bytes, "greeting.txt").unwrap(), locator);
}

#[tokio::test]
async fn add_failure_carries_node_error_text() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/v0/add"))
        .respond_with(ResponseTemplate::new(500).set_body_string("blockstore: disk full"))
        .mount(&server)
        .await;

    let err = store_for(&server)
        .store(b"x".to_vec(), "x.bin")
        .await
        .unwrap_err();
    match err {
        StorageError::Api { status, body, .. } => {
            assert_eq!(status, 500);
            assert_eq!(body, "blockstore: disk full");
        }
        other => panic!("expected Api error, got {other:?}"),
    }
}

#[tokio::test]
async fn add_without_directory_entry_is_unavailable() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/v0/add"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string(format!("{{\"Name\":\"x.bin\",\"Hash\":\"{FILE_CID}\"}}\n")),
        )
        .mount(&server)
        .await;

    let err = store_for(&server)
        .store(b"x".to_vec(), "x.bin")
        .await
        .unwrap_err();
    assert!(matches!(err, StorageError::Unavailable(_)));
}

#[tokio::test]
async fn empty_listing_is_not_found() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/v0/ls"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(serde_json::json!({"Objects": [{"Links": []}]})),
        )
        .mount(&server)
        .await;

    let err = store_for(&server).retrieve(FILE_CID).await.unwrap_err();
    assert!(err.is_not_found());
}

#[tokio::test]
async fn malformed_listing_is_not_found() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/v0/ls"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>nope</html>"))
        .mount(&server)
        .await;

    let err = store_for(&server).retrieve(FILE_CID).await.unwrap_err();
    assert!(err.is_not_found());
}

#[tokio::test]
async fn status_reports_version_and_peers() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/v0/version"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"Version": "0.29.0"})))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/v0/swarm/peers"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "Peers": [{"Addr": "/ip4/1.2.3.4/tcp/4001", "Peer": "12D3Koo"}]
        })))
        .mount(&server)
        .await;

    let status = store_for(&server).status().await;
    let json = serde_json::to_value(&status).unwrap();
    assert_eq!(json["status"], "up");
    assert_eq!(json["detail"]["version"], "0.29.0");
    assert_eq!(json["detail"]["peerCount"], 1);
}

#[tokio::test]
async fn status_down_when_node_unreachable() {
    let store = IpfsStore::new(&IpfsConfig {
        api_url: "http://127.0.0.1:1".parse().unwrap(),
        timeout_secs: 2,
    })
    .unwrap();
    assert!(!store.status().await.is_up());
}
