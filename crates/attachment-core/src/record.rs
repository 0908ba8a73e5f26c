//! # Attachment Records
//!
//! The metadata row kept for every attachment. `integrity_hash` is the only
//! key into storage and never changes after creation. `filename`, `size`
//! and `encoding` may be missing on older rows and are backfilled the first
//! time the bytes are read and verified.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::hash::HashEncoding;

/// Synthetic filename given to attachments uploaded as a JSON body.
pub const JSON_FILENAME: &str = "json";

/// Metadata for one stored attachment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttachmentRecord {
    /// Primary key.
    pub id: Uuid,
    /// Storage locator and integrity reference.
    pub integrity_hash: String,
    /// Address of the organisation holding the bytes.
    pub owner: String,
    /// Original filename, or [`JSON_FILENAME`] for JSON uploads.
    pub filename: Option<String>,
    /// Size of the stored bytes.
    pub size: Option<i64>,
    /// Scheme the integrity hash was computed with.
    pub encoding: Option<HashEncoding>,
    /// Creation time.
    pub created_at: DateTime<Utc>,
    /// Last metadata change.
    pub updated_at: DateTime<Utc>,
}

impl AttachmentRecord {
    /// Whether the attachment was uploaded as a JSON body.
    pub fn is_json(&self) -> bool {
        self.filename.as_deref() == Some(JSON_FILENAME)
    }

    /// Build a patch that fills only the fields this record is missing.
    ///
    /// Fields that are already set are never overwritten.
    pub fn backfill(
        &self,
        filename: &str,
        size: usize,
        encoding: HashEncoding,
    ) -> AttachmentPatch {
        AttachmentPatch {
            filename: self.filename.is_none().then(|| filename.to_string()),
            size: if self.size.is_none() {
                i64::try_from(size).ok()
            } else {
                None
            },
            encoding: self.encoding.is_none().then_some(encoding),
        }
    }
}

/// Input for creating a new record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewAttachment {
    /// Storage locator and integrity reference.
    pub integrity_hash: String,
    /// Owning organisation address.
    pub owner: String,
    /// Original filename.
    pub filename: Option<String>,
    /// Size in bytes.
    pub size: Option<i64>,
    /// Hash scheme.
    pub encoding: Option<HashEncoding>,
}

impl NewAttachment {
    /// Materialise the record with a fresh id and timestamps.
    pub fn into_record(self, now: DateTime<Utc>) -> AttachmentRecord {
        AttachmentRecord {
            id: Uuid::new_v4(),
            integrity_hash: self.integrity_hash,
            owner: self.owner,
            filename: self.filename,
            size: self.size,
            encoding: self.encoding,
            created_at: now,
            updated_at: now,
        }
    }
}

/// Partial update of the mutable metadata fields.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AttachmentPatch {
    /// New filename.
    pub filename: Option<String>,
    /// New size.
    pub size: Option<i64>,
    /// New encoding.
    pub encoding: Option<HashEncoding>,
}

impl AttachmentPatch {
    /// True when applying the patch would change nothing.
    pub fn is_empty(&self) -> bool {
        self.filename.is_none() && self.size.is_none() && self.encoding.is_none()
    }

    /// Apply the patch in place, bumping `updated_at`.
    pub fn apply(&self, record: &mut AttachmentRecord, now: DateTime<Utc>) {
        if let Some(filename) = &self.filename {
            record.filename = Some(filename.clone());
        }
        if let Some(size) = self.size {
            record.size = Some(size);
        }
        if let Some(encoding) = self.encoding {
            record.encoding = Some(encoding);
        }
        record.updated_at = now;
    }
}
