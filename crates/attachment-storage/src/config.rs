//! Storage backend configuration.
//!
//! The backend family is chosen once from `STORAGE_BACKEND_MODE`
//! (`IPFS`, `S3` or `AZURE`; default `IPFS`).

use url::Url;
use zeroize::Zeroizing;

/// IPFS node settings.
#[derive(Debug, Clone)]
pub struct IpfsConfig {
    /// RPC API base URL, e.g. `http://127.0.0.1:5001`.
    pub api_url: Url,
    /// Request timeout in seconds.
    pub timeout_secs: u64,
}

/// S3-compatible bucket settings.
///
/// Custom `Debug` redacts the secret key.
#[derive(Clone)]
pub struct S3Config {
    /// Service endpoint.
    pub endpoint: Url,
    /// Signing region.
    pub region: String,
    /// Access key id.
    pub access_key_id: String,
    /// Secret access key.
    pub secret_access_key: Zeroizing<String>,
    /// Target bucket.
    pub bucket: String,
}

impl std::fmt::Debug for S3Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("S3Config")
            .field("endpoint", &self.endpoint)
            .field("region", &self.region)
            .field("access_key_id", &self.access_key_id)
            .field("secret_access_key", &"[REDACTED]")
            .field("bucket", &self.bucket)
            .finish()
    }
}

/// Azure Blob settings.
///
/// Custom `Debug` redacts the account key.
#[derive(Clone)]
pub struct AzureConfig {
    /// Blob service endpoint, including the account segment for emulators.
    pub blob_endpoint: Url,
    /// Storage account name.
    pub account_name: String,
    /// Base64 account key.
    pub account_key: Zeroizing<String>,
    /// Target container.
    pub container: String,
    /// Request timeout in seconds.
    pub timeout_secs: u64,
}

impl std::fmt::Debug for AzureConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AzureConfig")
            .field("blob_endpoint", &self.blob_endpoint)
            .field("account_name", &self.account_name)
            .field("account_key", &"[REDACTED]")
            .field("container", &self.container)
            .field("timeout_secs", &self.timeout_secs)
            .finish()
    }
}

/// Selected backend and its settings.
#[derive(Debug, Clone)]
pub enum StorageConfig {
    /// IPFS node.
    Ipfs(IpfsConfig),
    /// S3-compatible bucket.
    S3(S3Config),
    /// Azure Blob container.
    Azure(AzureConfig),
}

impl StorageConfig {
    /// Load configuration from environment variables.
    ///
    /// Variables:
    /// - `STORAGE_BACKEND_MODE` (default: `IPFS`)
    /// - `IPFS_HOST` (default: `localhost`), `IPFS_PORT` (default: 5001)
    /// - `STORAGE_BACKEND_PROTOCOL` (default: `http`), `STORAGE_BACKEND_HOST`,
    ///   `STORAGE_BACKEND_PORT`, `STORAGE_BACKEND_BUCKET_NAME`
    /// - S3: `STORAGE_BACKEND_S3_REGION` (default: `us-east-1`),
    ///   `STORAGE_BACKEND_ACCESS_KEY_ID`, `STORAGE_BACKEND_SECRET_ACCESS_KEY`
    /// - Azure: `STORAGE_BACKEND_ACCOUNT_NAME`, `STORAGE_BACKEND_ACCOUNT_SECRET`
    /// - `STORAGE_TIMEOUT_SECS` (default: 30)
    pub fn from_env() -> Result<Self, ConfigError> {
        let timeout_secs = env_or("STORAGE_TIMEOUT_SECS", "30")
            .parse()
            .map_err(|_| ConfigError::InvalidValue("STORAGE_TIMEOUT_SECS".into()))?;

        match env_or("STORAGE_BACKEND_MODE", "IPFS").to_ascii_uppercase().as_str() {
            "IPFS" => Ok(Self::Ipfs(IpfsConfig {
                api_url: parse_url(
                    "IPFS_HOST",
                    &format!(
                        "http://{}:{}",
                        env_or("IPFS_HOST", "localhost"),
                        env_or("IPFS_PORT", "5001")
                    ),
                )?,
                timeout_secs,
            })),
            "S3" => Ok(Self::S3(S3Config {
                endpoint: backend_origin()?,
                region: env_or("STORAGE_BACKEND_S3_REGION", "us-east-1"),
                access_key_id: required("STORAGE_BACKEND_ACCESS_KEY_ID")?,
                secret_access_key: Zeroizing::new(required("STORAGE_BACKEND_SECRET_ACCESS_KEY")?),
                bucket: required("STORAGE_BACKEND_BUCKET_NAME")?,
            })),
            "AZURE" => {
                let account_name = required("STORAGE_BACKEND_ACCOUNT_NAME")?;
                let origin = backend_origin()?;
                Ok(Self::Azure(AzureConfig {
                    blob_endpoint: parse_url(
                        "STORAGE_BACKEND_HOST",
                        &format!("{}/{account_name}", origin.as_str().trim_end_matches('/')),
                    )?,
                    account_name,
                    account_key: Zeroizing::new(required("STORAGE_BACKEND_ACCOUNT_SECRET")?),
                    container: required("STORAGE_BACKEND_BUCKET_NAME")?,
                    timeout_secs,
                }))
            }
            other => Err(ConfigError::UnknownMode(other.to_string())),
        }
    }

    /// Name of the selected mode.
    pub fn mode(&self) -> &'static str {
        match self {
            Self::Ipfs(_) => "IPFS",
            Self::S3(_) => "S3",
            Self::Azure(_) => "AZURE",
        }
    }
}

fn backend_origin() -> Result<Url, ConfigError> {
    let protocol = env_or("STORAGE_BACKEND_PROTOCOL", "http");
    let host = required("STORAGE_BACKEND_HOST")?;
    let raw = match std::env::var("STORAGE_BACKEND_PORT") {
        Ok(port) => format!("{protocol}://{host}:{port}"),
        Err(_) => format!("{protocol}://{host}"),
    };
    parse_url("STORAGE_BACKEND_HOST", &raw)
}

fn env_or(var: &str, default: &str) -> String {
    std::env::var(var).unwrap_or_else(|_| default.to_string())
}

fn required(var: &str) -> Result<String, ConfigError> {
    std::env::var(var).map_err(|_| ConfigError::Missing(var.to_string()))
}

fn parse_url(var: &str, raw: &str) -> Result<Url, ConfigError> {
    Url::parse(raw).map_err(|e| ConfigError::InvalidUrl(var.to_string(), e.to_string()))
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{0} environment variable is required")]
    Missing(String),
    #[error("invalid URL for {0}: {1}")]
    InvalidUrl(String, String),
    #[error("invalid value for {0}")]
    InvalidValue(String),
    #[error("unknown STORAGE_BACKEND_MODE {0:?}; expected IPFS, S3 or AZURE")]
    UnknownMode(String),
    #[error("storage mode {0} is not compiled into this build")]
    Unsupported(&'static str),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_url_rejects_garbage() {
        assert!(parse_url("X", "not a url").is_err());
        assert_eq!(
            parse_url("X", "http://localhost:5001").unwrap().as_str(),
            "http://localhost:5001/"
        );
    }

    #[test]
    fn secrets_are_redacted_in_debug() {
        let cfg = S3Config {
            endpoint: Url::parse("http://minio:9000").unwrap(),
            region: "us-east-1".into(),
            access_key_id: "AKIA".into(),
            secret_access_key: Zeroizing::new("very-secret".into()),
            bucket: "attachments".into(),
        };
        let debug = format!("{cfg:?}");
        assert!(debug.contains("[REDACTED]"));
        assert!(!debug.contains("very-secret"));
    }

    #[test]
    fn required_reports_variable_name() {
        let err = required("ATTACHMENT_STORAGE_TEST_UNSET_VAR").unwrap_err();
        assert!(err.to_string().contains("ATTACHMENT_STORAGE_TEST_UNSET_VAR"));
    }
}
