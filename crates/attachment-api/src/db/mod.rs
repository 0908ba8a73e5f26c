//! # Metadata Persistence
//!
//! The attachment table sits behind the [`AttachmentStore`] trait. When
//! `DATABASE_URL` is set the service uses [`postgres::PgAttachmentStore`];
//! otherwise it runs on [`memory::MemoryAttachmentStore`], which loses its
//! contents on restart.

pub mod memory;
pub mod postgres;

use async_trait::async_trait;
use attachment_core::{AttachmentPatch, AttachmentRecord, Filter, NewAttachment};
use sqlx::postgres::{PgPool, PgPoolOptions};

/// Metadata store errors.
#[derive(Debug, thiserror::Error)]
pub enum MetadataError {
    /// Database driver error.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    /// A stored row could not be mapped to a record.
    #[error("corrupt attachment row {id}: {reason}")]
    CorruptRow { id: uuid::Uuid, reason: String },
}

/// CRUD over attachment records.
#[async_trait]
pub trait AttachmentStore: Send + Sync {
    /// Records matching `filter`, oldest first.
    async fn get(&self, filter: &Filter) -> Result<Vec<AttachmentRecord>, MetadataError>;

    /// Insert a record and return it as stored.
    async fn insert(&self, attachment: NewAttachment) -> Result<AttachmentRecord, MetadataError>;

    /// Apply `patch` to every matching record. Returns the number updated.
    async fn update(&self, filter: &Filter, patch: &AttachmentPatch)
        -> Result<u64, MetadataError>;

    /// Delete every matching record. Returns the number deleted.
    async fn delete(&self, filter: &Filter) -> Result<u64, MetadataError>;

    /// Cheap liveness check.
    async fn ping(&self) -> Result<(), MetadataError>;
}

/// Initialize the database connection pool and run migrations.
///
/// Returns `None` if `DATABASE_URL` is not set (in-memory mode).
/// Returns `Err` if the URL is set but the connection or migration fails.
pub async fn init_pool() -> Result<Option<PgPool>, sqlx::Error> {
    let url = match std::env::var("DATABASE_URL") {
        Ok(url) => url,
        Err(_) => {
            tracing::warn!(
                "DATABASE_URL not set; running with in-memory metadata. \
                 Records will not survive restarts."
            );
            return Ok(None);
        }
    };

    let pool = PgPoolOptions::new()
        .max_connections(20)
        .min_connections(2)
        .acquire_timeout(std::time::Duration::from_secs(5))
        .connect(&url)
        .await?;

    tracing::info!("Connected to PostgreSQL");

    sqlx::migrate!("./migrations").run(&pool).await?;
    tracing::info!("Database migrations applied");

    Ok(Some(pool))
}
