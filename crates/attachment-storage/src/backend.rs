//! # Storage Backend Abstraction
//!
//! One trait, two families of implementation selected once at start-up:
//!
//! - [`IpfsStore`](crate::ipfs::IpfsStore) keeps bytes on an IPFS node.
//!   The locator is the CIDv0 of a directory wrapping the single file, so
//!   the filename is part of the hash.
//! - [`BucketStore`](crate::bucket::BucketStore) keeps bytes in an object
//!   bucket keyed by the SHA-256 hex digest of the content.
//!
//! In both cases the locator returned by `store` is the attachment's
//! integrity hash.

use async_trait::async_trait;
use attachment_core::HashEncoding;
use serde::Serialize;

use crate::error::StorageError;
use crate::integrity;

/// Bytes read back from a backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredObject {
    /// Full content, buffered.
    pub bytes: Vec<u8>,
    /// Filename recorded by the backend, when it keeps one.
    pub filename: Option<String>,
}

/// Result of probing a backend for readiness.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum BackendStatus {
    /// Reachable; `detail` carries backend-specific information.
    Up { detail: serde_json::Value },
    /// Unreachable or misconfigured.
    Down { reason: String },
}

impl BackendStatus {
    /// Whether the backend is usable.
    pub fn is_up(&self) -> bool {
        matches!(self, Self::Up { .. })
    }
}

/// A content store addressed by integrity hash.
#[async_trait]
pub trait StorageBackend: Send + Sync {
    /// Short backend name for logs and health output.
    fn name(&self) -> &'static str;

    /// Hash scheme of the locators this backend produces.
    fn encoding(&self) -> HashEncoding;

    /// Store bytes under a locator derived from the content and return it.
    async fn store(&self, bytes: Vec<u8>, filename: &str) -> Result<String, StorageError>;

    /// Read back everything stored under a locator.
    async fn retrieve(&self, locator: &str) -> Result<StoredObject, StorageError>;

    /// Recompute, without contacting the backend, the locator `store`
    /// would return for these bytes.
    fn verify(&self, bytes: &[u8], filename: &str) -> Result<String, StorageError> {
        integrity::compute(self.encoding(), bytes, filename)
    }

    /// Probe the backend.
    async fn status(&self) -> BackendStatus;
}
