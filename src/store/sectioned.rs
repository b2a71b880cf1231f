//! Credential sets flattened into one section of a key-value config file.
//!
//! Section layout for a set holding `auth.globus.org`:
//!
//! ```text
//! auth_globus_org_scope = "openid profile email"
//! auth_globus_org_access_token = "..."
//! auth_globus_org_refresh_token = ""
//! auth_globus_org_token_type = "Bearer"
//! auth_globus_org_expires_at_seconds = "1700000000"
//! auth_globus_org_resource_server = "auth.globus.org"
//! token_groups = "auth_globus_org"
//! ```

use std::collections::BTreeMap;
use std::sync::Arc;

use crate::auth::{AuthError, CredentialRecord, CredentialSet};
use crate::config::SectionStore;

/// Index key listing every namespace present in a section.
pub const TOKEN_GROUPS_KEY: &str = "token_groups";

const FIELD_SCOPE: &str = "scope";
const FIELD_ACCESS_TOKEN: &str = "access_token";
const FIELD_REFRESH_TOKEN: &str = "refresh_token";
const FIELD_TOKEN_TYPE: &str = "token_type";
const FIELD_EXPIRES_AT: &str = "expires_at_seconds";
const FIELD_RESOURCE_SERVER: &str = "resource_server";

const FIELDS: [&str; 6] = [
    FIELD_SCOPE,
    FIELD_ACCESS_TOKEN,
    FIELD_REFRESH_TOKEN,
    FIELD_TOKEN_TYPE,
    FIELD_EXPIRES_AT,
    FIELD_RESOURCE_SERVER,
];

/// [`super::CredentialStore`] over a [`SectionStore`] handle; partition = section.
///
/// # Example
/// ```no_run
/// use std::sync::Arc;
/// use native_auth::config::ConfigFile;
/// use native_auth::store::{CredentialStore, SectionedStore};
///
/// let store = SectionedStore::new(Arc::new(ConfigFile::new("/tmp/native-apps.toml")));
/// let removed = store.remove("my-app")?;
/// # Ok::<(), native_auth::auth::AuthError>(())
/// ```
#[derive(Clone)]
pub struct SectionedStore {
    config: Arc<dyn SectionStore>,
}

impl std::fmt::Debug for SectionedStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SectionedStore").finish_non_exhaustive()
    }
}

impl SectionedStore {
    pub fn new(config: Arc<dyn SectionStore>) -> Self {
        Self { config }
    }
}

impl super::CredentialStore for SectionedStore {
    fn save(&self, partition: &str, credentials: &CredentialSet) -> Result<(), AuthError> {
        let existing = self.config.get_section(partition)?.unwrap_or_default();
        let mut groups = parse_groups(existing.get(TOKEN_GROUPS_KEY).map(String::as_str));
        let mut claimed: BTreeMap<String, String> = groups
            .iter()
            .filter_map(|group| {
                existing
                    .get(&field_key(group, FIELD_RESOURCE_SERVER))
                    .map(|rs| (group.clone(), rs.clone()))
            })
            .collect();

        let mut entries = Vec::with_capacity(credentials.len() * FIELDS.len() + 1);
        for record in credentials.records() {
            let group = namespace(&record.resource_server);
            if let Some(owner) = claimed.get(&group) {
                if owner != &record.resource_server {
                    return Err(AuthError::Configuration(format!(
                        "Resource servers {owner:?} and {:?} share the config namespace {group:?}",
                        record.resource_server
                    )));
                }
            }
            claimed.insert(group.clone(), record.resource_server.clone());
            if !groups.contains(&group) {
                groups.push(group.clone());
            }
            entries.extend(encode_record(record));
        }
        entries.push((TOKEN_GROUPS_KEY.to_string(), groups.join(",")));

        tracing::debug!(
            partition,
            resource_servers = credentials.len(),
            "Saving credentials to config section"
        );
        self.config.set_all(partition, &entries)
    }

    fn load_unchecked(&self, partition: &str) -> Result<CredentialSet, AuthError> {
        let section = self.config.get_section(partition)?.ok_or_else(|| {
            AuthError::Configuration(format!("No stored credentials in section {partition:?}"))
        })?;
        let index = section.get(TOKEN_GROUPS_KEY).ok_or_else(|| {
            AuthError::Configuration(format!(
                "Section {partition:?} has no {TOKEN_GROUPS_KEY} entry"
            ))
        })?;

        let mut credentials = CredentialSet::new();
        for group in parse_groups(Some(index)) {
            credentials.insert(decode_group(&group, &section)?);
        }
        Ok(credentials)
    }

    fn remove(&self, partition: &str) -> Result<bool, AuthError> {
        let Some(index) = self.config.get(partition, TOKEN_GROUPS_KEY)? else {
            return Ok(false);
        };
        let mut keys: Vec<String> = parse_groups(Some(&index))
            .iter()
            .flat_map(|group| FIELDS.iter().map(move |field| field_key(group, field)))
            .collect();
        keys.push(TOKEN_GROUPS_KEY.to_string());

        let removed = self.config.remove_all(partition, &keys)?;
        tracing::debug!(partition, removed, "Removed credentials from config section");
        Ok(true)
    }
}

/// Config namespace for a resource server: every `.` becomes `_`.
///
/// Not injective (`a.b` and `a_b` collide); the identifier itself is stored
/// under `{namespace}_resource_server` and is what decoding returns.
pub fn namespace(resource_server: &str) -> String {
    resource_server.replace('.', "_")
}

fn field_key(group: &str, field: &str) -> String {
    format!("{group}_{field}")
}

fn parse_groups(index: Option<&str>) -> Vec<String> {
    index
        .unwrap_or_default()
        .split(',')
        .map(str::trim)
        .filter(|group| !group.is_empty())
        .map(str::to_string)
        .collect()
}

/// Flatten one record into `{namespace}_{field}` entries.
pub fn encode_record(record: &CredentialRecord) -> Vec<(String, String)> {
    let group = namespace(&record.resource_server);
    let optional = |value: &Option<String>| value.clone().unwrap_or_default();
    vec![
        (field_key(&group, FIELD_SCOPE), record.scope.clone()),
        (field_key(&group, FIELD_ACCESS_TOKEN), record.access_token.clone()),
        (field_key(&group, FIELD_REFRESH_TOKEN), optional(&record.refresh_token)),
        (field_key(&group, FIELD_TOKEN_TYPE), optional(&record.token_type)),
        (field_key(&group, FIELD_EXPIRES_AT), record.expires_at.to_string()),
        (field_key(&group, FIELD_RESOURCE_SERVER), record.resource_server.clone()),
    ]
}

/// Reassemble the record stored under `group` from a section's entries.
///
/// Empty optional fields come back as `None`. Empty required fields are kept
/// so validation can report them.
pub fn decode_group(
    group: &str,
    section: &BTreeMap<String, String>,
) -> Result<CredentialRecord, AuthError> {
    let value = |field: &str| {
        section
            .get(&field_key(group, field))
            .cloned()
            .unwrap_or_default()
    };
    let optional = |field: &str| Some(value(field)).filter(|v| !v.is_empty());

    let resource_server = value(FIELD_RESOURCE_SERVER);
    if resource_server.is_empty() {
        return Err(AuthError::Configuration(format!(
            "Missing [\"resource_server\"] from loaded credentials for group {group:?}"
        )));
    }
    let raw_expiry = value(FIELD_EXPIRES_AT);
    let expires_at = raw_expiry.trim().parse::<i64>().map_err(|_| {
        AuthError::Configuration(format!(
            "Invalid expires_at_seconds {raw_expiry:?} for {resource_server}"
        ))
    })?;

    Ok(CredentialRecord {
        resource_server,
        scope: value(FIELD_SCOPE),
        access_token: value(FIELD_ACCESS_TOKEN),
        refresh_token: optional(FIELD_REFRESH_TOKEN),
        token_type: optional(FIELD_TOKEN_TYPE),
        expires_at,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ConfigFile;
    use crate::store::CredentialStore;
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    fn record(resource_server: &str) -> CredentialRecord {
        CredentialRecord {
            resource_server: resource_server.to_string(),
            scope: "openid profile".to_string(),
            access_token: format!("{resource_server}-access"),
            refresh_token: Some("refresh".to_string()),
            token_type: Some("Bearer".to_string()),
            expires_at: 1_900_000_000,
        }
    }

    fn temp_store() -> (TempDir, Arc<ConfigFile>, SectionedStore) {
        let dir = TempDir::new().unwrap();
        let file = Arc::new(ConfigFile::new(dir.path().join("native-apps.toml")));
        let store = SectionedStore::new(file.clone());
        (dir, file, store)
    }

    #[test]
    fn namespace_maps_dots_to_underscores() {
        assert_eq!(namespace("auth.globus.org"), "auth_globus_org");
        assert_eq!(namespace("no-dots"), "no-dots");
    }

    #[test]
    fn encode_then_decode_preserves_awkward_identifiers() {
        let identifiers = [
            "auth.globus.org",
            "a_b",
            "a.b",
            "a..b",
            ".leading",
            "trailing.",
            "_under_",
            "x._.y",
            "foo=;# = !@#$%^&*()",
            "with,comma.and space",
            "ünïcödé.example",
        ];
        for identifier in identifiers {
            let original = CredentialRecord {
                refresh_token: None,
                ..record(identifier)
            };
            let section: BTreeMap<String, String> = encode_record(&original).into_iter().collect();
            let decoded = decode_group(&namespace(identifier), &section).unwrap();
            assert_eq!(decoded, original, "identifier {identifier:?}");
        }
    }

    #[test]
    fn absent_optionals_serialize_to_empty_and_decode_to_none() {
        let original = CredentialRecord {
            refresh_token: None,
            token_type: None,
            ..record("auth.globus.org")
        };
        let section: BTreeMap<String, String> = encode_record(&original).into_iter().collect();
        assert_eq!(section["auth_globus_org_refresh_token"], "");
        assert_eq!(section["auth_globus_org_expires_at_seconds"], "1900000000");

        let decoded = decode_group("auth_globus_org", &section).unwrap();
        assert_eq!(decoded.refresh_token, None);
        assert_eq!(decoded.token_type, None);
    }

    #[test]
    fn save_writes_flat_keys_and_index() {
        let (_dir, file, store) = temp_store();
        let set: CredentialSet = vec![record("auth.globus.org"), record("transfer.api.globus.org")]
            .into_iter()
            .collect();

        store.save("my-app", &set).unwrap();

        let section = file.get_section("my-app").unwrap().unwrap();
        assert_eq!(
            section[TOKEN_GROUPS_KEY],
            "auth_globus_org,transfer_api_globus_org"
        );
        assert_eq!(
            section["transfer_api_globus_org_resource_server"],
            "transfer.api.globus.org"
        );
        assert_eq!(store.load_unchecked("my-app").unwrap(), set);
    }

    #[test]
    fn save_merges_index_with_existing_groups() {
        let (_dir, _file, store) = temp_store();
        store
            .save("my-app", &std::iter::once(record("auth.globus.org")).collect())
            .unwrap();
        store
            .save(
                "my-app",
                &std::iter::once(record("transfer.api.globus.org")).collect(),
            )
            .unwrap();

        let loaded = store.load_unchecked("my-app").unwrap();
        assert!(loaded.contains("auth.globus.org"));
        assert!(loaded.contains("transfer.api.globus.org"));
    }

    #[test]
    fn colliding_namespaces_are_refused() {
        let (_dir, _file, store) = temp_store();
        let set: CredentialSet = vec![record("a.b"), record("a_b")].into_iter().collect();
        let err = store.save("my-app", &set).unwrap_err();
        assert!(matches!(err, AuthError::Configuration(msg) if msg.contains("a_b")));

        store
            .save("my-app", &std::iter::once(record("a.b")).collect())
            .unwrap();
        let err = store
            .save("my-app", &std::iter::once(record("a_b")).collect())
            .unwrap_err();
        assert!(matches!(err, AuthError::Configuration(_)));
    }

    #[test]
    fn missing_section_is_a_configuration_error() {
        let (_dir, _file, store) = temp_store();
        let err = store.load_unchecked("my-app").unwrap_err();
        assert!(matches!(err, AuthError::Configuration(_)));
    }

    #[test]
    fn bad_expiry_is_a_configuration_error() {
        let (_dir, file, store) = temp_store();
        file.set("my-app", TOKEN_GROUPS_KEY, "auth_globus_org").unwrap();
        file.set("my-app", "auth_globus_org_resource_server", "auth.globus.org")
            .unwrap();
        file.set("my-app", "auth_globus_org_expires_at_seconds", "soon")
            .unwrap();

        let err = store.load_unchecked("my-app").unwrap_err();
        assert!(matches!(err, AuthError::Configuration(msg) if msg.contains("soon")));
    }

    #[test]
    fn remove_clears_every_key_and_is_idempotent() {
        let (_dir, file, store) = temp_store();
        file.set("my-app", "unrelated", "keep").unwrap();
        store
            .save("my-app", &std::iter::once(record("auth.globus.org")).collect())
            .unwrap();

        assert!(store.remove("my-app").unwrap());
        let section = file.get_section("my-app").unwrap().unwrap();
        assert_eq!(section.len(), 1);
        assert_eq!(section["unrelated"], "keep");

        assert!(!store.remove("my-app").unwrap());
        assert!(!store.remove("never-written").unwrap());
    }
}
