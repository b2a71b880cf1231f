//! JSON document backend: one versioned envelope per partition.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::auth::{AuthError, CredentialSet};
use crate::util::fs::{atomic_write, read_optional};

/// Envelope version written by this crate.
pub const FORMAT_VERSION: &str = "1.0";
/// Envelope versions this crate can read.
pub const SUPPORTED_FORMAT_VERSIONS: &[&str] = &[FORMAT_VERSION];

/// On-disk envelope around a credential set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredEnvelope {
    pub format_version: String,
    /// Version of the crate that last wrote the document. Informational.
    #[serde(default)]
    pub producer_version: String,
    #[serde(alias = "by_rs")]
    pub by_resource_server: CredentialSet,
}

impl Default for StoredEnvelope {
    fn default() -> Self {
        Self {
            format_version: FORMAT_VERSION.to_string(),
            producer_version: env!("CARGO_PKG_VERSION").to_string(),
            by_resource_server: CredentialSet::new(),
        }
    }
}

/// [`super::CredentialStore`] writing one JSON document per partition.
///
/// # Example
/// ```no_run
/// use native_auth::store::{CredentialStore, DocumentStore};
///
/// let store = DocumentStore::new("/tmp/native-auth/tokens");
/// let credentials = store.load_unchecked("My App")?;
/// println!("{} resource servers", credentials.len());
/// # Ok::<(), native_auth::auth::AuthError>(())
/// ```
#[derive(Debug, Clone)]
pub struct DocumentStore {
    base_dir: PathBuf,
}

impl DocumentStore {
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: base_dir.into(),
        }
    }

    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    pub fn document_path(&self, partition: &str) -> PathBuf {
        self.base_dir
            .join(format!("{}.json", normalize_partition(partition)))
    }

    /// Read the envelope for `partition`, or an empty one if none is stored.
    pub fn load_envelope(&self, partition: &str) -> Result<StoredEnvelope, AuthError> {
        let path = self.document_path(partition);
        let Some(raw) = read_optional(&path)? else {
            return Ok(StoredEnvelope::default());
        };

        let value: serde_json::Value = serde_json::from_str(&raw).map_err(|err| {
            AuthError::Configuration(format!(
                "Failed to parse token document {}: {err}",
                path.display()
            ))
        })?;
        let version = value
            .get("format_version")
            .and_then(serde_json::Value::as_str)
            .unwrap_or_default();
        if !SUPPORTED_FORMAT_VERSIONS.contains(&version) {
            return Err(AuthError::Configuration(format!(
                "Unsupported token document format_version {version:?} in {} (supported: {SUPPORTED_FORMAT_VERSIONS:?})",
                path.display()
            )));
        }
        if value.get("by_resource_server").is_none() && value.get("by_rs").is_none() {
            return Err(AuthError::Configuration(format!(
                "Token document {} has no by_resource_server entry",
                path.display()
            )));
        }

        let envelope: StoredEnvelope = serde_json::from_value(value).map_err(|err| {
            AuthError::Configuration(format!(
                "Invalid token document {}: {err}",
                path.display()
            ))
        })?;

        // Keys must agree with the records they hold.
        if let Some((key, record)) = (&envelope.by_resource_server)
            .into_iter()
            .find(|(key, record)| key.as_str() != record.resource_server)
        {
            return Err(AuthError::Configuration(format!(
                "Token document {} files {:?} under key {key:?}",
                path.display(),
                record.resource_server
            )));
        }
        Ok(envelope)
    }
}

impl super::CredentialStore for DocumentStore {
    fn save(&self, partition: &str, credentials: &CredentialSet) -> Result<(), AuthError> {
        let mut envelope = self.load_envelope(partition)?;
        envelope.format_version = FORMAT_VERSION.to_string();
        envelope.producer_version = env!("CARGO_PKG_VERSION").to_string();
        envelope.by_resource_server.extend(credentials.clone());

        let path = self.document_path(partition);
        let json = serde_json::to_vec_pretty(&envelope)?;
        atomic_write(&path, &json)?;
        tracing::debug!(
            partition,
            path = %path.display(),
            resource_servers = envelope.by_resource_server.len(),
            "Saved credential document"
        );
        Ok(())
    }

    fn load_unchecked(&self, partition: &str) -> Result<CredentialSet, AuthError> {
        Ok(self.load_envelope(partition)?.by_resource_server)
    }

    fn remove(&self, partition: &str) -> Result<bool, AuthError> {
        let path = self.document_path(partition);
        match fs::remove_file(&path) {
            Ok(()) => Ok(true),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(err) => Err(AuthError::Io(err.to_string())),
        }
    }
}

fn normalize_partition(value: &str) -> String {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return "default".to_string();
    }
    trimmed
        .chars()
        .map(|ch| {
            let lower = ch.to_ascii_lowercase();
            if lower.is_ascii_alphanumeric() || lower == '-' {
                lower
            } else {
                '-'
            }
        })
        .collect()
}
