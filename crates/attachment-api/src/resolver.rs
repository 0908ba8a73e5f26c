//! # Attachment Resolution
//!
//! Turns a metadata record into a response body:
//!
//! 1. Bytes come from the local [`StorageBackend`] when this organisation
//!    owns the record, otherwise from the owning peer.
//! 2. The bytes are hashed with the record's encoding (classified from the
//!    integrity hash for legacy rows) and compared with `integrity_hash`.
//!    Mismatching bytes are never returned.
//! 3. Missing `filename`, `size` and `encoding` are backfilled. A failed
//!    backfill is logged and ignored.
//! 4. JSON uploads are returned as JSON when the `Accept` header prefers it;
//!    everything else is returned as an octet stream.

use std::sync::Arc;

use attachment_core::{
    identify, negotiate_json_attachment, AttachmentRecord, Filter, HashEncoding, HashError,
    Representation, JSON_FILENAME,
};
use attachment_federation::{FederationError, PeerAttachmentSource};
use attachment_storage::{integrity, StorageBackend, StorageError};
use uuid::Uuid;

use crate::db::AttachmentStore;

/// Errors from resolving an attachment.
#[derive(Debug, thiserror::Error)]
pub enum ResolveError {
    /// Storage has no object under the record's hash.
    #[error("attachment content {0} not found")]
    NotFound(String),
    /// The bytes do not hash to the record's integrity hash.
    #[error("integrity check failed for attachment {id}")]
    IntegrityCheckFailed { id: Uuid },
    /// The record's integrity hash cannot be classified.
    #[error("invalid integrity hash: {0}")]
    Hash(#[from] HashError),
    /// A CIDv0 hash cannot be recomputed without a filename.
    #[error("no filename known for attachment {0}")]
    UnknownFilename(Uuid),
    /// Local storage failed.
    #[error(transparent)]
    Storage(StorageError),
    /// Peer federation failed.
    #[error(transparent)]
    Federation(#[from] FederationError),
    /// Verification task failed.
    #[error("verification task failed: {0}")]
    Internal(String),
}

impl From<StorageError> for ResolveError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::NotFound(locator) => Self::NotFound(locator),
            other => Self::Storage(other),
        }
    }
}

/// A verified attachment ready to be sent.
#[derive(Debug, Clone, PartialEq)]
pub enum Resolved {
    /// Parsed JSON body.
    Json(serde_json::Value),
    /// Raw bytes with a download filename.
    Octet { bytes: Vec<u8>, filename: String },
}

/// Download name for peer content that arrives without one.
pub const PEER_FALLBACK_FILENAME: &str = "external";

struct Fetched {
    bytes: Vec<u8>,
    filename: Option<String>,
    from_peer: bool,
}

/// Orchestrates fetch, verification, backfill and negotiation.
#[derive(Clone)]
pub struct AttachmentResolver {
    storage: Arc<dyn StorageBackend>,
    peers: Arc<dyn PeerAttachmentSource>,
    metadata: Arc<dyn AttachmentStore>,
}

impl AttachmentResolver {
    pub fn new(
        storage: Arc<dyn StorageBackend>,
        peers: Arc<dyn PeerAttachmentSource>,
        metadata: Arc<dyn AttachmentStore>,
    ) -> Self {
        Self {
            storage,
            peers,
            metadata,
        }
    }

    /// Resolve `record` for a caller whose `Accept` header is `accept`.
    ///
    /// `local_address` is this organisation's address; records owned by
    /// anyone else are fetched from their owner.
    pub async fn resolve(
        &self,
        record: &AttachmentRecord,
        local_address: &str,
        accept: &str,
    ) -> Result<Resolved, ResolveError> {
        let fetched = if record.owner == local_address {
            let object = self.storage.retrieve(&record.integrity_hash).await?;
            Fetched {
                bytes: object.bytes,
                filename: object.filename,
                from_peer: false,
            }
        } else {
            let peer = self
                .peers
                .fetch(&record.owner, &record.integrity_hash)
                .await?;
            Fetched {
                bytes: peer.bytes,
                filename: peer.filename,
                from_peer: true,
            }
        };

        let encoding = match record.encoding {
            Some(encoding) => encoding,
            None => identify(&record.integrity_hash)?,
        };
        let observed = fetched.filename.or_else(|| record.filename.clone());
        let bytes = self
            .verify(record, encoding, observed.as_deref(), fetched.bytes)
            .await?;

        if let Some(name) = observed.as_deref() {
            self.backfill(record, name, bytes.len(), encoding).await;
        }

        let filename = if fetched.from_peer {
            observed.unwrap_or_else(|| PEER_FALLBACK_FILENAME.to_string())
        } else {
            record
                .filename
                .clone()
                .or(observed)
                .unwrap_or_else(|| record.integrity_hash.clone())
        };

        Ok(negotiate(record.id, bytes, filename, accept))
    }

    /// Hash `bytes` off the async runtime and compare with the record.
    async fn verify(
        &self,
        record: &AttachmentRecord,
        encoding: HashEncoding,
        filename: Option<&str>,
        bytes: Vec<u8>,
    ) -> Result<Vec<u8>, ResolveError> {
        let filename = match (encoding, filename) {
            (_, Some(name)) => name.to_string(),
            (HashEncoding::Sha256, None) => String::new(),
            (HashEncoding::CidV0, None) => return Err(ResolveError::UnknownFilename(record.id)),
        };

        let (bytes, actual) = tokio::task::spawn_blocking(move || {
            let actual = integrity::compute(encoding, &bytes, &filename);
            (bytes, actual)
        })
        .await
        .map_err(|e| ResolveError::Internal(e.to_string()))?;
        let actual = actual?;

        if encoding.digests_match(&record.integrity_hash, &actual) {
            Ok(bytes)
        } else {
            tracing::warn!(
                attachment = %record.id,
                expected = %record.integrity_hash,
                actual = %actual,
                %encoding,
                "integrity check failed"
            );
            Err(ResolveError::IntegrityCheckFailed { id: record.id })
        }
    }

    async fn backfill(
        &self,
        record: &AttachmentRecord,
        filename: &str,
        size: usize,
        encoding: HashEncoding,
    ) {
        let patch = record.backfill(filename, size, encoding);
        if patch.is_empty() {
            return;
        }
        match self.metadata.update(&Filter::by_id(record.id), &patch).await {
            Ok(_) => tracing::debug!(attachment = %record.id, ?patch, "backfilled metadata"),
            Err(e) => {
                tracing::warn!(attachment = %record.id, error = %e, "metadata backfill failed")
            }
        }
    }
}

fn negotiate(id: Uuid, bytes: Vec<u8>, filename: String, accept: &str) -> Resolved {
    if filename == JSON_FILENAME && negotiate_json_attachment(accept) == Representation::Json {
        match serde_json::from_slice(&bytes) {
            Ok(json) => return Resolved::Json(json),
            Err(e) => {
                tracing::warn!(attachment = %id, error = %e, "stored JSON attachment does not parse");
            }
        }
    }
    Resolved::Octet { bytes, filename }
}
