//! Federation credential directory.
//!
//! A JSON file listing, for each peer organisation, the client credentials
//! this service uses against that peer's IdP:
//!
//! ```json
//! { "credentials": [ { "username": "...", "secret": "...", "owner": "0x..." } ] }
//! ```
//!
//! The file is read once on first lookup. A failed read is not remembered,
//! so a file that appears later is picked up.

use std::path::{Path, PathBuf};

use serde::Deserialize;
use tokio::sync::OnceCell;
use zeroize::Zeroizing;

use crate::error::FederationError;

/// Client credentials for one peer organisation.
#[derive(Clone)]
pub struct Credential {
    pub client_id: String,
    pub client_secret: Zeroizing<String>,
    /// Organisation address the credentials belong to.
    pub organization_id: String,
}

impl std::fmt::Debug for Credential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credential")
            .field("client_id", &self.client_id)
            .field("client_secret", &"[REDACTED]")
            .field("organization_id", &self.organization_id)
            .finish()
    }
}

#[derive(Deserialize)]
struct CredentialFile {
    credentials: Vec<CredentialEntry>,
}

#[derive(Deserialize)]
struct CredentialEntry {
    username: String,
    secret: String,
    owner: String,
}

/// Lazily loaded credential directory.
#[derive(Debug)]
pub struct CredentialDirectory {
    path: PathBuf,
    cache: OnceCell<Vec<Credential>>,
}

impl CredentialDirectory {
    /// Directory backed by the file at `path`. Nothing is read yet.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            cache: OnceCell::new(),
        }
    }

    /// Directory with a fixed set of credentials.
    pub fn from_credentials(credentials: Vec<Credential>) -> Self {
        Self {
            path: PathBuf::new(),
            cache: OnceCell::new_with(Some(credentials)),
        }
    }

    /// Path of the backing file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Credentials for `owner`. The first matching entry wins.
    pub async fn lookup(&self, owner: &str) -> Result<Credential, FederationError> {
        let credentials = self.cache.get_or_try_init(|| load(&self.path)).await?;
        credentials
            .iter()
            .find(|c| c.organization_id == owner)
            .cloned()
            .ok_or_else(|| FederationError::NoCredentials {
                owner: owner.to_string(),
            })
    }
}

async fn load(path: &Path) -> Result<Vec<Credential>, FederationError> {
    let unavailable = |reason: String| FederationError::CredentialsUnavailable {
        path: path.display().to_string(),
        reason,
    };

    let raw = tokio::fs::read(path)
        .await
        .map_err(|e| unavailable(e.to_string()))?;
    let file: CredentialFile =
        serde_json::from_slice(&raw).map_err(|e| unavailable(e.to_string()))?;

    tracing::debug!(
        path = %path.display(),
        entries = file.credentials.len(),
        "loaded federation credentials"
    );

    Ok(file
        .credentials
        .into_iter()
        .map(|entry| Credential {
            client_id: entry.username,
            client_secret: Zeroizing::new(entry.secret),
            organization_id: entry.owner,
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_file(contents: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file
    }

    #[tokio::test]
    async fn first_matching_entry_wins() {
        let file = write_file(
            r#"{"credentials":[
                {"username":"first","secret":"s1","owner":"0xpeer"},
                {"username":"second","secret":"s2","owner":"0xpeer"},
                {"username":"other","secret":"s3","owner":"0xother"}
            ]}"#,
        );
        let dir = CredentialDirectory::new(file.path());

        let cred = dir.lookup("0xpeer").await.unwrap();
        assert_eq!(cred.client_id, "first");
        assert_eq!(cred.client_secret.as_str(), "s1");
        assert_eq!(dir.lookup("0xother").await.unwrap().client_id, "other");
    }

    #[tokio::test]
    async fn unknown_owner_is_no_credentials() {
        let file = write_file(r#"{"credentials":[]}"#);
        let dir = CredentialDirectory::new(file.path());
        let err = dir.lookup("0xnobody").await.unwrap_err();
        assert!(matches!(err, FederationError::NoCredentials { owner } if owner == "0xnobody"));
    }

    #[tokio::test]
    async fn missing_file_is_retried() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("credentials.json");
        let dir = CredentialDirectory::new(&path);

        let err = dir.lookup("0xpeer").await.unwrap_err();
        assert!(matches!(err, FederationError::CredentialsUnavailable { .. }));

        std::fs::write(
            &path,
            r#"{"credentials":[{"username":"late","secret":"s","owner":"0xpeer"}]}"#,
        )
        .unwrap();
        assert_eq!(dir.lookup("0xpeer").await.unwrap().client_id, "late");
    }

    #[tokio::test]
    async fn malformed_file_is_unavailable() {
        let file = write_file("{not json");
        let dir = CredentialDirectory::new(file.path());
        assert!(matches!(
            dir.lookup("0xpeer").await.unwrap_err(),
            FederationError::CredentialsUnavailable { .. }
        ));
    }

    #[test]
    fn debug_redacts_secret() {
        let cred = Credential {
            client_id: "id".into(),
            client_secret: Zeroizing::new("topsecret".into()),
            organization_id: "0xpeer".into(),
        };
        assert!(!format!("{cred:?}").contains("topsecret"));
    }
}
