use std::collections::btree_map;
use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

/// Token set issued for one resource server.
///
/// # Example
/// ```
/// use native_auth::auth::CredentialRecord;
///
/// let record = CredentialRecord {
///     resource_server: "auth.globus.org".to_string(),
///     scope: "openid profile email".to_string(),
///     access_token: "access".to_string(),
///     refresh_token: None,
///     token_type: Some("Bearer".to_string()),
///     expires_at: 1_900_000_000,
/// };
/// assert_eq!(record.scopes().count(), 3);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CredentialRecord {
    pub resource_server: String,
    /// Space-delimited scope strings.
    pub scope: String,
    pub access_token: String,
    #[serde(default)]
    pub refresh_token: Option<String>,
    #[serde(default)]
    pub token_type: Option<String>,
    /// Absolute expiry, epoch seconds.
    #[serde(rename = "expires_at_seconds")]
    pub expires_at: i64,
}

impl CredentialRecord {
    pub fn scopes(&self) -> impl Iterator<Item = &str> {
        self.scope.split_whitespace()
    }

    pub fn is_expired_at(&self, now: i64) -> bool {
        self.expires_at <= now
    }
}

/// Credentials for one principal, keyed by resource server.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CredentialSet(BTreeMap<String, CredentialRecord>);

impl CredentialSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a record under its own resource server, replacing any previous one.
    pub fn insert(&mut self, record: CredentialRecord) -> Option<CredentialRecord> {
        self.0.insert(record.resource_server.clone(), record)
    }

    pub fn get(&self, resource_server: &str) -> Option<&CredentialRecord> {
        self.0.get(resource_server)
    }

    pub fn remove(&mut self, resource_server: &str) -> Option<CredentialRecord> {
        self.0.remove(resource_server)
    }

    pub fn contains(&self, resource_server: &str) -> bool {
        self.0.contains_key(resource_server)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn resource_servers(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    pub fn records(&self) -> impl Iterator<Item = &CredentialRecord> {
        self.0.values()
    }

    /// Union of every record's scopes.
    pub fn scopes(&self) -> BTreeSet<&str> {
        self.records().flat_map(CredentialRecord::scopes).collect()
    }

    /// Merge `other` into `self`; entries in `other` win.
    pub fn extend(&mut self, other: CredentialSet) {
        self.0.extend(other.0);
    }

    pub fn into_inner(self) -> BTreeMap<String, CredentialRecord> {
        self.0
    }
}

impl FromIterator<CredentialRecord> for CredentialSet {
    fn from_iter<I: IntoIterator<Item = CredentialRecord>>(iter: I) -> Self {
        let mut set = Self::new();
        for record in iter {
            set.insert(record);
        }
        set
    }
}

impl IntoIterator for CredentialSet {
    type Item = (String, CredentialRecord);
    type IntoIter = btree_map::IntoIter<String, CredentialRecord>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

impl<'a> IntoIterator for &'a CredentialSet {
    type Item = (&'a String, &'a CredentialRecord);
    type IntoIter = btree_map::Iter<'a, String, CredentialRecord>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}
