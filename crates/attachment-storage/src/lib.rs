//! # attachment-storage — Content Stores for Attachments
//!
//! Provides the [`StorageBackend`] trait and its implementations:
//!
//! - **IPFS** ([`ipfs::IpfsStore`]): directory-wrapped uploads addressed by
//!   CIDv0, verified locally by rebuilding the UnixFS DAG ([`unixfs`]).
//! - **Buckets** ([`bucket::BucketStore`]): SHA-256 addressed objects over
//!   S3 ([`s3`], feature `s3`), Azure Blob ([`azure`]) or process memory
//!   ([`memory`]).
//!
//! The backend is picked once from [`StorageConfig`] by [`connect`].

pub mod azure;
pub mod backend;
pub mod bucket;
pub mod config;
pub mod error;
pub mod integrity;
pub mod ipfs;
pub mod memory;
#[cfg(feature = "s3")]
pub mod s3;
pub mod unixfs;

pub use backend::{BackendStatus, StorageBackend, StoredObject};
pub use bucket::{BucketClient, BucketStore};
pub use config::{ConfigError, StorageConfig};
pub use error::StorageError;

use std::sync::Arc;

/// Build the configured backend.
pub async fn connect(config: StorageConfig) -> Result<Arc<dyn StorageBackend>, StorageError> {
    tracing::info!(mode = config.mode(), "configuring storage backend");
    match config {
        StorageConfig::Ipfs(cfg) => Ok(Arc::new(ipfs::IpfsStore::new(&cfg)?)),
        StorageConfig::Azure(cfg) => {
            let client = azure::AzureBlobClient::new(&cfg)?;
            Ok(Arc::new(BucketStore::new(Arc::new(client), cfg.container)))
        }
        #[cfg(feature = "s3")]
        StorageConfig::S3(cfg) => {
            let client = s3::S3BucketClient::from_config(&cfg).await;
            Ok(Arc::new(BucketStore::new(Arc::new(client), cfg.bucket)))
        }
        #[cfg(not(feature = "s3"))]
        StorageConfig::S3(_) => Err(ConfigError::Unsupported("S3").into()),
    }
}
