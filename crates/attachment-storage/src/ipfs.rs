//! # IPFS Content-Addressed Store
//!
//! Talks to the IPFS HTTP RPC API (`/api/v0/*`, all calls are `POST`).
//! Files are added wrapped in a directory so the filename survives the
//! round trip; the directory CID is the locator.

use std::time::Duration;

use async_trait::async_trait;
use attachment_core::HashEncoding;
use reqwest::multipart::{Form, Part};
use serde::Deserialize;

use crate::backend::{BackendStatus, StorageBackend, StoredObject};
use crate::config::IpfsConfig;
use crate::error::StorageError;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct AddEntry {
    name: String,
    hash: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct LsResponse {
    #[serde(default)]
    objects: Vec<LsObject>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct LsObject {
    #[serde(default)]
    links: Vec<LsLink>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct LsLink {
    hash: String,
    name: String,
}

/// Storage backend over an IPFS node.
#[derive(Debug, Clone)]
pub struct IpfsStore {
    http: reqwest::Client,
    api_url: url::Url,
}

impl IpfsStore {
    /// Create a store for the node described by `config`.
    pub fn new(config: &IpfsConfig) -> Result<Self, StorageError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| StorageError::Http {
                endpoint: "client_init".into(),
                source: e,
            })?;
        Ok(Self {
            http,
            api_url: config.api_url.clone(),
        })
    }

    fn url(&self, command: &str) -> String {
        format!(
            "{}/api/v0/{command}",
            self.api_url.as_str().trim_end_matches('/')
        )
    }

    /// Send an RPC request and fail on transport errors or non-2xx answers.
    async fn call(
        &self,
        endpoint: &str,
        request: reqwest::RequestBuilder,
    ) -> Result<reqwest::Response, StorageError> {
        let resp = request.send().await.map_err(|e| StorageError::Http {
            endpoint: endpoint.into(),
            source: e,
        })?;

        if !resp.status().is_success() {
            let status = resp.status().as_u16();
            let body = resp.text().await.unwrap_or_default();
            return Err(StorageError::Api {
                endpoint: endpoint.into(),
                status,
                body,
            });
        }
        Ok(resp)
    }

    /// Resolve a directory CID to the CID and name of its single entry.
    async fn list(&self, locator: &str) -> Result<LsLink, StorageError> {
        let endpoint = "POST /api/v0/ls";
        let resp = self
            .call(
                endpoint,
                self.http.post(self.url("ls")).query(&[("arg", locator)]),
            )
            .await?;

        let listing: LsResponse = resp.json().await.map_err(|e| {
            tracing::warn!(locator, error = %e, "malformed IPFS directory listing");
            StorageError::NotFound(locator.to_string())
        })?;

        listing
            .objects
            .into_iter()
            .next()
            .and_then(|object| object.links.into_iter().next())
            .ok_or_else(|| StorageError::NotFound(locator.to_string()))
    }
}

#[async_trait]
impl StorageBackend for IpfsStore {
    fn name(&self) -> &'static str {
        "ipfs"
    }

    fn encoding(&self) -> HashEncoding {
        HashEncoding::CidV0
    }

    async fn store(&self, bytes: Vec<u8>, filename: &str) -> Result<String, StorageError> {
        let endpoint = "POST /api/v0/add";
        let form = Form::new().part("file", Part::bytes(bytes).file_name(filename.to_string()));
        let resp = self
            .call(
                endpoint,
                self.http
                    .post(self.url("add"))
                    .query(&[("cid-version", "0"), ("wrap-with-directory", "true")])
                    .multipart(form),
            )
            .await?;

        let body = resp.text().await.map_err(|e| StorageError::Http {
            endpoint: endpoint.into(),
            source: e,
        })?;

        // One JSON object per line; the wrapping directory has an empty name.
        let directory = body
            .lines()
            .filter(|line| !line.trim().is_empty())
            .filter_map(|line| serde_json::from_str::<AddEntry>(line).ok())
            .find(|entry| entry.name.is_empty())
            .ok_or_else(|| {
                StorageError::Unavailable("IPFS add returned no wrapping directory".into())
            })?;

        tracing::debug!(cid = %directory.hash, filename, "stored attachment on IPFS");
        Ok(directory.hash)
    }

    async fn retrieve(&self, locator: &str) -> Result<StoredObject, StorageError> {
        let entry = self.list(locator).await?;

        let resp = self
            .call(
                "POST /api/v0/cat",
                self.http.post(self.url("cat")).query(&[("arg", entry.hash.as_str())]),
            )
            .await?;
        let bytes = resp.bytes().await.map_err(|e| StorageError::Http {
            endpoint: "POST /api/v0/cat".into(),
            source: e,
        })?;

        Ok(StoredObject {
            bytes: bytes.to_vec(),
            filename: Some(entry.name).filter(|name| !name.is_empty()),
        })
    }

    async fn status(&self) -> BackendStatus {
        let version = match self
            .call("POST /api/v0/version", self.http.post(self.url("version")))
            .await
        {
            Ok(resp) => resp.json::<serde_json::Value>().await.ok(),
            Err(e) => return BackendStatus::Down { reason: e.to_string() },
        };
        let peers = match self
            .call("POST /api/v0/swarm/peers", self.http.post(self.url("swarm/peers")))
            .await
        {
            Ok(resp) => resp
                .json::<serde_json::Value>()
                .await
                .ok()
                .and_then(|v| v.get("Peers").and_then(|p| p.as_array()).map(Vec::len))
                .unwrap_or(0),
            Err(e) => return BackendStatus::Down { reason: e.to_string() },
        };

        BackendStatus::Up {
            detail: serde_json::json!({
                "version": version.as_ref().and_then(|v| v.get("Version")).cloned(),
                "peerCount": peers,
            }),
        }
    }
}
