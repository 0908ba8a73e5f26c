//! In-memory bucket client for development and tests.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::RwLock;

use crate::backend::StoredObject;
use crate::bucket::BucketClient;
use crate::error::StorageError;

type Buckets = HashMap<String, HashMap<String, StoredObject>>;

/// Bucket client keeping every object in process memory.
///
/// Clones share the same buckets.
#[derive(Debug, Clone, Default)]
pub struct MemoryBucketClient {
    buckets: Arc<RwLock<Buckets>>,
}

impl MemoryBucketClient {
    /// Create an empty client.
    pub fn new() -> Self {
        Self::default()
    }

    /// Names of all buckets, sorted.
    pub fn bucket_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.buckets.read().keys().cloned().collect();
        names.sort();
        names
    }

    /// Number of objects in a bucket (0 when it does not exist).
    pub fn object_count(&self, bucket: &str) -> usize {
        self.buckets.read().get(bucket).map_or(0, HashMap::len)
    }

    /// Overwrite an object's bytes in place, keeping its metadata.
    pub fn tamper(&self, bucket: &str, key: &str, bytes: Vec<u8>) -> bool {
        match self
            .buckets
            .write()
            .get_mut(bucket)
            .and_then(|objects| objects.get_mut(key))
        {
            Some(object) => {
                object.bytes = bytes;
                true
            }
            None => false,
        }
    }
}

#[async_trait]
impl BucketClient for MemoryBucketClient {
    fn provider(&self) -> &'static str {
        "memory"
    }

    async fn bucket_exists(&self, bucket: &str) -> Result<bool, StorageError> {
        Ok(self.buckets.read().contains_key(bucket))
    }

    async fn create_bucket(&self, bucket: &str) -> Result<(), StorageError> {
        self.buckets.write().entry(bucket.to_string()).or_default();
        Ok(())
    }

    async fn put_object(
        &self,
        bucket: &str,
        key: &str,
        bytes: Vec<u8>,
        filename: &str,
    ) -> Result<(), StorageError> {
        let mut buckets = self.buckets.write();
        let objects = buckets
            .get_mut(bucket)
            .ok_or_else(|| StorageError::Unavailable(format!("bucket {bucket} does not exist")))?;
        objects.insert(
            key.to_string(),
            StoredObject {
                bytes,
                filename: Some(filename.to_string()),
            },
        );
        Ok(())
    }

    async fn get_object(&self, bucket: &str, key: &str) -> Result<StoredObject, StorageError> {
        self.buckets
            .read()
            .get(bucket)
            .and_then(|objects| objects.get(key))
            .cloned()
            .ok_or_else(|| StorageError::NotFound(key.to_string()))
    }
}
