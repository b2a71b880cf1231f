//! Credential persistence: the storage contract, its two backends, and the
//! validate / revoke-and-clear protocol shared by both.

pub mod document;
pub mod sectioned;
pub mod validate;

pub use document::{DocumentStore, StoredEnvelope, FORMAT_VERSION, SUPPORTED_FORMAT_VERSIONS};
pub use sectioned::{SectionedStore, TOKEN_GROUPS_KEY};
pub use validate::validate_credentials;

use chrono::Utc;

use crate::auth::{AuthError, AuthorizationServer, CredentialSet};

/// Storage abstraction for persisted credential sets.
///
/// A partition names one credential set (an app, a user, a section).
pub trait CredentialStore: Send + Sync {
    /// Merge `credentials` into the partition.
    fn save(&self, partition: &str, credentials: &CredentialSet) -> Result<(), AuthError>;

    /// Read the partition without validating it.
    fn load_unchecked(&self, partition: &str) -> Result<CredentialSet, AuthError>;

    /// Remove everything stored under the partition; `true` if anything was there.
    fn remove(&self, partition: &str) -> Result<bool, AuthError>;

    /// Read and validate the partition.
    ///
    /// Fails with [`AuthError::Configuration`] when nothing usable is stored,
    /// [`AuthError::ScopeMismatch`] when stored scopes exceed
    /// `requested_scopes`, and [`AuthError::ExpiredCredentials`] when
    /// `check_expired` is set and a record has expired.
    fn load(
        &self,
        partition: &str,
        requested_scopes: &[String],
        check_expired: bool,
    ) -> Result<CredentialSet, AuthError> {
        let credentials = self.load_unchecked(partition)?;
        validate_credentials(
            &credentials,
            requested_scopes,
            check_expired,
            Utc::now().timestamp(),
        )?;
        Ok(credentials)
    }
}

/// Revoke whatever is stored under `partition` and delete it.
///
/// Revocation is best effort: failures are logged and the local deletion
/// still happens. Expired records are deleted without a revoke call.
/// Returns whether anything was cleared.
pub async fn revoke_and_clear(
    store: &dyn CredentialStore,
    server: &dyn AuthorizationServer,
    partition: &str,
    client_id: &str,
) -> Result<bool, AuthError> {
    let credentials = match store.load(partition, &[], false) {
        Ok(credentials) => credentials,
        Err(err) if err.is_validation() => {
            tracing::debug!(partition, error = %err, "No usable credentials to revoke");
            CredentialSet::new()
        }
        Err(err) => return Err(err),
    };

    let now = Utc::now().timestamp();
    for record in credentials.records() {
        if record.is_expired_at(now) {
            tracing::debug!(
                resource_server = %record.resource_server,
                "Skipping revoke of expired token"
            );
            continue;
        }
        tracing::debug!(resource_server = %record.resource_server, "Revoking token");
        if let Err(err) = server.revoke_token(client_id, &record.access_token).await {
            tracing::warn!(
                resource_server = %record.resource_server,
                error = %err,
                "Token revocation failed; deleting local copy anyway"
            );
        }
    }

    store.remove(partition)
}
