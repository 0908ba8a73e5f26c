//! # Bucket Store
//!
//! Content-addressed storage on top of a plain object bucket. The object
//! key is the SHA-256 hex digest of the content, and the original filename
//! rides along as object metadata. Provider specifics (S3, Azure Blob,
//! memory) live behind [`BucketClient`].

use std::sync::Arc;

use async_trait::async_trait;
use attachment_core::HashEncoding;

use crate::backend::{BackendStatus, StorageBackend, StoredObject};
use crate::error::StorageError;
use crate::integrity::sha256_hex;

/// Minimal object-store operations a [`BucketStore`] needs.
#[async_trait]
pub trait BucketClient: Send + Sync {
    /// Provider name for logs and health output.
    fn provider(&self) -> &'static str;

    /// Whether the bucket exists.
    async fn bucket_exists(&self, bucket: &str) -> Result<bool, StorageError>;

    /// Create the bucket. Creating a bucket that already exists succeeds.
    async fn create_bucket(&self, bucket: &str) -> Result<(), StorageError>;

    /// Upload an object, recording `filename` as object metadata.
    async fn put_object(
        &self,
        bucket: &str,
        key: &str,
        bytes: Vec<u8>,
        filename: &str,
    ) -> Result<(), StorageError>;

    /// Download an object. A missing object is [`StorageError::NotFound`].
    async fn get_object(&self, bucket: &str, key: &str) -> Result<StoredObject, StorageError>;
}

/// Storage backend over one bucket.
#[derive(Clone)]
pub struct BucketStore {
    client: Arc<dyn BucketClient>,
    bucket: String,
}

impl std::fmt::Debug for BucketStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BucketStore")
            .field("provider", &self.client.provider())
            .field("bucket", &self.bucket)
            .finish()
    }
}

impl BucketStore {
    /// Create a store writing to `bucket` through `client`.
    pub fn new(client: Arc<dyn BucketClient>, bucket: impl Into<String>) -> Self {
        Self {
            client,
            bucket: bucket.into(),
        }
    }

    /// Name of the target bucket.
    pub fn bucket(&self) -> &str {
        &self.bucket
    }

    /// Create the target bucket unless it already exists.
    pub async fn create_bucket_if_absent(&self) -> Result<(), StorageError> {
        if self.client.bucket_exists(&self.bucket).await? {
            return Ok(());
        }
        tracing::info!(
            bucket = %self.bucket,
            provider = self.client.provider(),
            "creating storage bucket"
        );
        self.client.create_bucket(&self.bucket).await
    }
}

#[async_trait]
impl StorageBackend for BucketStore {
    fn name(&self) -> &'static str {
        self.client.provider()
    }

    fn encoding(&self) -> HashEncoding {
        HashEncoding::Sha256
    }

    async fn store(&self, bytes: Vec<u8>, filename: &str) -> Result<String, StorageError> {
        let locator = sha256_hex(&bytes);
        self.create_bucket_if_absent().await?;
        self.client
            .put_object(&self.bucket, &locator, bytes, filename)
            .await?;
        tracing::debug!(locator = %locator, filename, bucket = %self.bucket, "stored attachment");
        Ok(locator)
    }

    async fn retrieve(&self, locator: &str) -> Result<StoredObject, StorageError> {
        self.client.get_object(&self.bucket, locator).await
    }

    async fn status(&self) -> BackendStatus {
        match self.client.bucket_exists(&self.bucket).await {
            Ok(exists) => BackendStatus::Up {
                detail: serde_json::json!({
                    "provider": self.client.provider(),
                    "bucket": self.bucket,
                    "bucketExists": exists,
                }),
            },
            Err(e) => BackendStatus::Down {
                reason: e.to_string(),
            },
        }
    }
}
