//! In-memory attachment store for development and tests.

use std::sync::Arc;

use async_trait::async_trait;
use attachment_core::{AttachmentPatch, AttachmentRecord, Filter, NewAttachment};
use chrono::Utc;
use parking_lot::RwLock;

use super::{AttachmentStore, MetadataError};

/// Attachment records held in process memory, in insertion order.
#[derive(Debug, Clone, Default)]
pub struct MemoryAttachmentStore {
    records: Arc<RwLock<Vec<AttachmentRecord>>>,
}

impl MemoryAttachmentStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a fully formed record, e.g. a legacy row without metadata.
    pub fn seed(&self, record: AttachmentRecord) {
        self.records.write().push(record);
    }

    pub fn len(&self) -> usize {
        self.records.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.read().is_empty()
    }
}

#[async_trait]
impl AttachmentStore for MemoryAttachmentStore {
    async fn get(&self, filter: &Filter) -> Result<Vec<AttachmentRecord>, MetadataError> {
        Ok(self
            .records
            .read()
            .iter()
            .filter(|r| filter.matches(r))
            .cloned()
            .collect())
    }

    async fn insert(&self, attachment: NewAttachment) -> Result<AttachmentRecord, MetadataError> {
        let record = attachment.into_record(Utc::now());
        self.records.write().push(record.clone());
        Ok(record)
    }

    async fn update(
        &self,
        filter: &Filter,
        patch: &AttachmentPatch,
    ) -> Result<u64, MetadataError> {
        let now = Utc::now();
        let mut updated = 0;
        for record in self.records.write().iter_mut().filter(|r| filter.matches(r)) {
            patch.apply(record, now);
            updated += 1;
        }
        Ok(updated)
    }

    async fn delete(&self, filter: &Filter) -> Result<u64, MetadataError> {
        let mut records = self.records.write();
        let before = records.len();
        records.retain(|r| !filter.matches(r));
        Ok((before - records.len()) as u64)
    }

    async fn ping(&self) -> Result<(), MetadataError> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use attachment_core::HashEncoding;

    fn new_attachment(hash: &str) -> NewAttachment {
        NewAttachment {
            integrity_hash: hash.into(),
            owner: "0xself".into(),
            filename: None,
            size: None,
            encoding: None,
        }
    }

    #[tokio::test]
    async fn insert_get_update_delete() {
        let store = MemoryAttachmentStore::new();
        let a = store.insert(new_attachment("aaa")).await.unwrap();
        store.insert(new_attachment("bbb")).await.unwrap();

        let found = store.get(&Filter::by_integrity_hash("aaa")).await.unwrap();
        assert_eq!(found, vec![a.clone()]);

        let patch = AttachmentPatch {
            filename: Some("a.txt".into()),
            size: Some(3),
            encoding: Some(HashEncoding::Sha256),
        };
        assert_eq!(store.update(&Filter::by_id(a.id), &patch).await.unwrap(), 1);
        let updated = &store.get(&Filter::by_id(a.id)).await.unwrap()[0];
        assert_eq!(updated.filename.as_deref(), Some("a.txt"));
        assert_eq!(updated.size, Some(3));
        assert!(updated.updated_at >= a.updated_at);

        assert_eq!(store.delete(&Filter::by_id(a.id)).await.unwrap(), 1);
        assert_eq!(store.len(), 1);
        assert_eq!(store.delete(&Filter::by_id(a.id)).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn empty_filter_lists_everything_in_order() {
        let store = MemoryAttachmentStore::new();
        for hash in ["1", "2", "3"] {
            store.insert(new_attachment(hash)).await.unwrap();
        }
        let hashes: Vec<String> = store
            .get(&Filter::new())
            .await
            .unwrap()
            .into_iter()
            .map(|r| r.integrity_hash)
            .collect();
        assert_eq!(hashes, ["1", "2", "3"]);
    }
}
