//! Checks applied to every loaded credential set, regardless of backend.

use std::collections::BTreeSet;

use crate::auth::{AuthError, CredentialSet};

/// Validate a loaded set against the caller's expectations.
///
/// `requested_scopes` empty disables the scope check. `now` is epoch seconds.
pub fn validate_credentials(
    credentials: &CredentialSet,
    requested_scopes: &[String],
    check_expired: bool,
    now: i64,
) -> Result<(), AuthError> {
    if credentials.is_empty() {
        return Err(AuthError::Configuration(
            "No credentials stored".to_string(),
        ));
    }

    for (key, record) in credentials {
        let mut missing = Vec::new();
        if record.scope.trim().is_empty() {
            missing.push("scope");
        }
        if record.access_token.is_empty() {
            missing.push("access_token");
        }
        if record.resource_server.is_empty() {
            missing.push("resource_server");
        }
        if !missing.is_empty() {
            return Err(AuthError::Configuration(format!(
                "Missing {missing:?} from loaded credentials for {key}"
            )));
        }
    }

    if !requested_scopes.is_empty() {
        let requested: BTreeSet<&str> = requested_scopes.iter().map(String::as_str).collect();
        let loaded = credentials.scopes();
        if !loaded.is_subset(&requested) {
            return Err(AuthError::ScopeMismatch {
                requested: requested_scopes.to_vec(),
                loaded: loaded.into_iter().map(str::to_string).collect(),
            });
        }
    }

    if check_expired {
        let expired: Vec<String> = credentials
            .records()
            .filter(|record| record.is_expired_at(now))
            .map(|record| record.resource_server.clone())
            .collect();
        if !expired.is_empty() {
            return Err(AuthError::ExpiredCredentials {
                resource_servers: expired,
            });
        }
    }

    Ok(())
}
