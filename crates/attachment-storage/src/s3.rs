//! S3-compatible bucket client.
//!
//! Uses path-style addressing so MinIO, LocalStack and similar services work
//! with the same configuration as AWS. The SDK's retry layer is disabled.

use async_trait::async_trait;
use aws_config::retry::RetryConfig;
use aws_config::{BehaviorVersion, Region};
use aws_sdk_s3::config::Credentials;
use aws_sdk_s3::error::DisplayErrorContext;
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::types::{BucketLocationConstraint, CreateBucketConfiguration};

use crate::backend::StoredObject;
use crate::bucket::BucketClient;
use crate::config::S3Config;
use crate::error::StorageError;

/// Region that rejects an explicit location constraint.
const DEFAULT_REGION: &str = "us-east-1";

/// Metadata key holding the original filename.
const FILENAME_METADATA: &str = "filename";

/// Bucket client for S3 and S3-compatible services.
#[derive(Debug, Clone)]
pub struct S3BucketClient {
    client: aws_sdk_s3::Client,
    region: String,
}

impl S3BucketClient {
    /// Build a client from static credentials and an explicit endpoint.
    pub async fn from_config(config: &S3Config) -> Self {
        let credentials = Credentials::new(
            config.access_key_id.as_str(),
            config.secret_access_key.as_str(),
            None,
            None,
            "attachment-storage",
        );
        let sdk_config = aws_config::defaults(BehaviorVersion::latest())
            .region(Region::new(config.region.clone()))
            .credentials_provider(credentials)
            .endpoint_url(config.endpoint.as_str())
            .retry_config(RetryConfig::disabled())
            .load()
            .await;
        let s3_config = aws_sdk_s3::config::Builder::from(&sdk_config)
            .force_path_style(true)
            .build();

        Self {
            client: aws_sdk_s3::Client::from_conf(s3_config),
            region: config.region.clone(),
        }
    }
}

#[async_trait]
impl BucketClient for S3BucketClient {
    fn provider(&self) -> &'static str {
        "s3"
    }

    async fn bucket_exists(&self, bucket: &str) -> Result<bool, StorageError> {
        match self.client.head_bucket().bucket(bucket).send().await {
            Ok(_) => Ok(true),
            Err(err) => {
                if err.as_service_error().is_some_and(|e| e.is_not_found()) {
                    Ok(false)
                } else {
                    Err(StorageError::Unavailable(format!(
                        "HeadBucket {bucket}: {}",
                        DisplayErrorContext(&err)
                    )))
                }
            }
        }
    }

    async fn create_bucket(&self, bucket: &str) -> Result<(), StorageError> {
        let mut request = self.client.create_bucket().bucket(bucket);
        if self.region != DEFAULT_REGION {
            request = request.create_bucket_configuration(
                CreateBucketConfiguration::builder()
                    .location_constraint(BucketLocationConstraint::from(self.region.as_str()))
                    .build(),
            );
        }

        match request.send().await {
            Ok(_) => Ok(()),
            Err(err) => {
                let already_there = err.as_service_error().is_some_and(|e| {
                    e.is_bucket_already_owned_by_you() || e.is_bucket_already_exists()
                });
                if already_there {
                    Ok(())
                } else {
                    Err(StorageError::Unavailable(format!(
                        "CreateBucket {bucket}: {}",
                        DisplayErrorContext(&err)
                    )))
                }
            }
        }
    }

    async fn put_object(
        &self,
        bucket: &str,
        key: &str,
        bytes: Vec<u8>,
        filename: &str,
    ) -> Result<(), StorageError> {
        let mut request = self
            .client
            .put_object()
            .bucket(bucket)
            .key(key)
            .content_type("application/octet-stream")
            .body(ByteStream::from(bytes));
        // User metadata travels as an HTTP header and must stay printable ASCII.
        if filename.bytes().all(|b| (0x20..0x7f).contains(&b)) {
            request = request.metadata(FILENAME_METADATA, filename);
        }

        request.send().await.map_err(|err| {
            StorageError::Unavailable(format!("PutObject {bucket}/{key}: {}", DisplayErrorContext(&err)))
        })?;
        Ok(())
    }

    async fn get_object(&self, bucket: &str, key: &str) -> Result<StoredObject, StorageError> {
        let output = match self.client.get_object().bucket(bucket).key(key).send().await {
            Ok(output) => output,
            Err(err) => {
                let missing = err.as_service_error().is_some_and(|e| e.is_no_such_key())
                    || err
                        .raw_response()
                        .is_some_and(|resp| resp.status().as_u16() == 404);
                return Err(if missing {
                    StorageError::NotFound(key.to_string())
                } else {
                    StorageError::Unavailable(format!(
                        "GetObject {bucket}/{key}: {}",
                        DisplayErrorContext(&err)
                    ))
                });
            }
        };

        let filename = output
            .metadata()
            .and_then(|m| m.get(FILENAME_METADATA))
            .cloned();
        let bytes = output
            .body
            .collect()
            .await
            .map_err(|e| StorageError::Unavailable(format!("GetObject {bucket}/{key}: {e}")))?
            .into_bytes()
            .to_vec();

        Ok(StoredObject { bytes, filename })
    }
}
