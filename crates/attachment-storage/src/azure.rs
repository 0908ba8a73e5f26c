//! # Azure Blob Storage Client
//!
//! Speaks the Blob service REST API directly with Shared Key
//! authorization. Works against Azure and the Azurite emulator; the blob
//! endpoint already contains the account for path-style emulator URLs.
//!
//! Requests are signed over the canonical string:
//!
//! ```text
//! VERB \n Content-Encoding \n Content-Language \n Content-Length \n
//! Content-MD5 \n Content-Type \n Date \n If-Modified-Since \n If-Match \n
//! If-None-Match \n If-Unmodified-Since \n Range \n
//! CanonicalizedHeaders CanonicalizedResource
//! ```

use std::collections::BTreeMap;
use std::time::Duration;

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use chrono::Utc;
use hmac::{Hmac, Mac};
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use reqwest::{Method, StatusCode};
use sha2::Sha256;
use zeroize::Zeroizing;

use crate::backend::StoredObject;
use crate::bucket::BucketClient;
use crate::config::AzureConfig;
use crate::error::StorageError;

const API_VERSION: &str = "2020-10-02";
const FILENAME_METADATA: &str = "x-ms-meta-filename";

/// Bucket client for Azure Blob containers.
#[derive(Clone)]
pub struct AzureBlobClient {
    http: reqwest::Client,
    blob_endpoint: url::Url,
    account_name: String,
    account_key: Zeroizing<Vec<u8>>,
}

impl std::fmt::Debug for AzureBlobClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AzureBlobClient")
            .field("blob_endpoint", &self.blob_endpoint)
            .field("account_name", &self.account_name)
            .field("account_key", &"[REDACTED]")
            .finish()
    }
}

impl AzureBlobClient {
    /// Create a client. The account key must be base64.
    pub fn new(config: &AzureConfig) -> Result<Self, StorageError> {
        let account_key = STANDARD
            .decode(config.account_key.as_bytes())
            .map_err(|e| {
                StorageError::Unavailable(format!("Azure account key is not valid base64: {e}"))
            })?;
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| StorageError::Http {
                endpoint: "client_init".into(),
                source: e,
            })?;
        Ok(Self {
            http,
            blob_endpoint: config.blob_endpoint.clone(),
            account_name: config.account_name.clone(),
            account_key: Zeroizing::new(account_key),
        })
    }

    fn url(&self, path: &str, query: &[(&str, &str)]) -> Result<url::Url, StorageError> {
        let base = self.blob_endpoint.as_str().trim_end_matches('/');
        let mut url = url::Url::parse(&format!("{base}/{path}"))
            .map_err(|e| StorageError::Unavailable(format!("invalid blob URL: {e}")))?;
        if !query.is_empty() {
            url.query_pairs_mut().extend_pairs(query);
        }
        Ok(url)
    }

    /// Sign and send a request.
    async fn send(
        &self,
        endpoint: &str,
        method: Method,
        url: url::Url,
        mut headers: HeaderMap,
        body: Vec<u8>,
    ) -> Result<reqwest::Response, StorageError> {
        let date = Utc::now().format("%a, %d %b %Y %H:%M:%S GMT").to_string();
        insert_header(&mut headers, "x-ms-date", &date)?;
        insert_header(&mut headers, "x-ms-version", API_VERSION)?;

        let string_to_sign =
            string_to_sign(&method, &url, &headers, body.len(), &self.account_name);
        let mut mac = Hmac::<Sha256>::new_from_slice(&self.account_key)
            .map_err(|e| StorageError::Unavailable(format!("invalid Azure account key: {e}")))?;
        mac.update(string_to_sign.as_bytes());
        let signature = STANDARD.encode(mac.finalize().into_bytes());
        insert_header(
            &mut headers,
            AUTHORIZATION.as_str(),
            &format!("SharedKey {}:{signature}", self.account_name),
        )?;

        self.http
            .request(method, url)
            .headers(headers)
            .body(body)
            .send()
            .await
            .map_err(|e| StorageError::Http {
                endpoint: endpoint.into(),
                source: e,
            })
    }
}

fn insert_header(headers: &mut HeaderMap, name: &str, value: &str) -> Result<(), StorageError> {
    let name = HeaderName::from_bytes(name.as_bytes())
        .map_err(|e| StorageError::Unavailable(format!("invalid header name {name}: {e}")))?;
    let value = HeaderValue::from_str(value)
        .map_err(|e| StorageError::Unavailable(format!("invalid header value for {name}: {e}")))?;
    headers.insert(name, value);
    Ok(())
}

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> &'a str {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
}

/// Build the Shared Key string-to-sign for a request.
fn string_to_sign(
    method: &Method,
    url: &url::Url,
    headers: &HeaderMap,
    content_length: usize,
    account: &str,
) -> String {
    let length = if content_length == 0 {
        String::new()
    } else {
        content_length.to_string()
    };

    let mut canonical_headers: Vec<(String, String)> = headers
        .iter()
        .filter(|(name, _)| name.as_str().starts_with("x-ms-"))
        .map(|(name, value)| {
            (
                name.as_str().to_string(),
                value.to_str().unwrap_or_default().trim().to_string(),
            )
        })
        .collect();
    canonical_headers.sort();

    let mut query: BTreeMap<String, Vec<String>> = BTreeMap::new();
    for (name, value) in url.query_pairs() {
        query
            .entry(name.to_ascii_lowercase())
            .or_default()
            .push(value.into_owned());
    }

    let mut out = format!(
        "{method}\n{}\n{}\n{length}\n{}\n{}\n\n{}\n{}\n{}\n{}\n{}\n",
        header_str(headers, "content-encoding"),
        header_str(headers, "content-language"),
        header_str(headers, "content-md5"),
        header_str(headers, CONTENT_TYPE.as_str()),
        header_str(headers, "if-modified-since"),
        header_str(headers, "if-match"),
        header_str(headers, "if-none-match"),
        header_str(headers, "if-unmodified-since"),
        header_str(headers, "range"),
    );
    for (name, value) in canonical_headers {
        out.push_str(&format!("{name}:{value}\n"));
    }
    out.push_str(&format!("/{account}{}", url.path()));
    for (name, mut values) in query {
        values.sort();
        out.push_str(&format!("\n{name}:{}", values.join(",")));
    }
    out
}

async fn error_body(endpoint: &str, resp: reqwest::Response) -> StorageError {
    let status = resp.status().as_u16();
    let body = resp.text().await.unwrap_or_default();
    StorageError::Api {
        endpoint: endpoint.into(),
        status,
        body,
    }
}

#[async_trait]
impl BucketClient for AzureBlobClient {
    fn provider(&self) -> &'static str {
        "azure"
    }

    async fn bucket_exists(&self, bucket: &str) -> Result<bool, StorageError> {
        let endpoint = format!("GET container {bucket}");
        let url = self.url(bucket, &[("restype", "container")])?;
        let resp = self
            .send(&endpoint, Method::GET, url, HeaderMap::new(), Vec::new())
            .await?;
        match resp.status() {
            s if s.is_success() => Ok(true),
            StatusCode::NOT_FOUND => Ok(false),
            _ => Err(error_body(&endpoint, resp).await),
        }
    }

    async fn create_bucket(&self, bucket: &str) -> Result<(), StorageError> {
        let endpoint = format!("PUT container {bucket}");
        let url = self.url(bucket, &[("restype", "container")])?;
        let resp = self
            .send(&endpoint, Method::PUT, url, HeaderMap::new(), Vec::new())
            .await?;
        match resp.status() {
            s if s.is_success() => Ok(()),
            // ContainerAlreadyExists
            StatusCode::CONFLICT => Ok(()),
            _ => Err(error_body(&endpoint, resp).await),
        }
    }

    async fn put_object(
        &self,
        bucket: &str,
        key: &str,
        bytes: Vec<u8>,
        filename: &str,
    ) -> Result<(), StorageError> {
        let endpoint = format!("PUT blob {bucket}/{key}");
        let url = self.url(&format!("{bucket}/{key}"), &[])?;
        let mut headers = HeaderMap::new();
        insert_header(&mut headers, "x-ms-blob-type", "BlockBlob")?;
        insert_header(&mut headers, CONTENT_TYPE.as_str(), "application/octet-stream")?;
        if filename.bytes().all(|b| (0x20..0x7f).contains(&b)) {
            insert_header(&mut headers, FILENAME_METADATA, filename)?;
        }

        let resp = self.send(&endpoint, Method::PUT, url, headers, bytes).await?;
        if !resp.status().is_success() {
            return Err(error_body(&endpoint, resp).await);
        }
        Ok(())
    }

    async fn get_object(&self, bucket: &str, key: &str) -> Result<StoredObject, StorageError> {
        let endpoint = format!("GET blob {bucket}/{key}");
        let url = self.url(&format!("{bucket}/{key}"), &[])?;
        let resp = self
            .send(&endpoint, Method::GET, url, HeaderMap::new(), Vec::new())
            .await?;

        if resp.status() == StatusCode::NOT_FOUND {
            return Err(StorageError::NotFound(key.to_string()));
        }
        if !resp.status().is_success() {
            return Err(error_body(&endpoint, resp).await);
        }

        let filename = resp
            .headers()
            .get(FILENAME_METADATA)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let bytes = resp.bytes().await.map_err(|e| StorageError::Http {
            endpoint: endpoint.clone(),
            source: e,
        })?;

        Ok(StoredObject {
            bytes: bytes.to_vec(),
            filename,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn string_to_sign_for_blob_upload() {
        let url = url::Url::parse("http://127.0.0.1:10000/devstoreaccount1/box/abc").unwrap();
        let mut headers = HeaderMap::new();
        insert_header(&mut headers, "x-ms-version", API_VERSION).unwrap();
        insert_header(&mut headers, "x-ms-date", "Mon, 01 Jan 2024 00:00:00 GMT").unwrap();
        insert_header(&mut headers, "x-ms-blob-type", "BlockBlob").unwrap();
        insert_header(&mut headers, "content-type", "application/octet-stream").unwrap();

        let s = string_to_sign(&Method::PUT, &url, &headers, 5, "devstoreaccount1");
        assert_eq!(
            s,
            "PUT\n\n\n5\n\napplication/octet-stream\n\n\n\n\n\n\n\
             x-ms-blob-type:BlockBlob\n\
             x-ms-date:Mon, 01 Jan 2024 00:00:00 GMT\n\
             x-ms-version:2020-10-02\n\
             /devstoreaccount1/devstoreaccount1/box/abc"
        );
    }

    #[test]
    fn string_to_sign_includes_sorted_query() {
        let url =
            url::Url::parse("http://127.0.0.1:10000/acct/box?restype=container&comp=list").unwrap();
        let s = string_to_sign(&Method::GET, &url, &HeaderMap::new(), 0, "acct");
        assert!(s.starts_with("GET\n\n\n\n"));
        assert!(s.ends_with("/acct/acct/box\ncomp:list\nrestype:container"));
    }
}
