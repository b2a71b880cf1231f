//! Sectioned key-value configuration file.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::auth::AuthError;
use crate::util::fs::{atomic_write, read_optional};

/// Narrow contract the sectioned credential store needs from a config file.
///
/// Every value is a string. Sections are created on first `set`.
pub trait SectionStore: Send + Sync {
    fn get(&self, section: &str, key: &str) -> Result<Option<String>, AuthError>;
    fn set(&self, section: &str, key: &str, value: &str) -> Result<(), AuthError>;
    /// Remove a key; `true` if it existed.
    fn remove(&self, section: &str, key: &str) -> Result<bool, AuthError>;
    fn get_section(&self, section: &str) -> Result<Option<BTreeMap<String, String>>, AuthError>;

    /// Set several keys at once. Implementations backed by a file should
    /// override this to write once.
    fn set_all(&self, section: &str, entries: &[(String, String)]) -> Result<(), AuthError> {
        for (key, value) in entries {
            self.set(section, key, value)?;
        }
        Ok(())
    }

    /// Remove several keys at once, returning how many existed.
    fn remove_all(&self, section: &str, keys: &[String]) -> Result<usize, AuthError> {
        let mut removed = 0;
        for key in keys {
            if self.remove(section, key)? {
                removed += 1;
            }
        }
        Ok(removed)
    }
}

/// TOML-backed [`SectionStore`]: one table per section, string values.
///
/// Each write re-reads the file and merges the change, so other sections and
/// keys written by someone else in the meantime survive. Writes are atomic
/// and owner-only.
///
/// # Example
/// ```no_run
/// use native_auth::config::{ConfigFile, SectionStore};
///
/// let file = ConfigFile::new("/tmp/native-apps.toml");
/// file.set("my-app", "token_groups", "auth_globus_org")?;
/// assert_eq!(
///     file.get("my-app", "token_groups")?.as_deref(),
///     Some("auth_globus_org")
/// );
/// # Ok::<(), native_auth::auth::AuthError>(())
/// ```
#[derive(Debug, Clone)]
pub struct ConfigFile {
    path: PathBuf,
}

impl ConfigFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read_document(&self) -> Result<toml::Table, AuthError> {
        let Some(raw) = read_optional(&self.path)? else {
            return Ok(toml::Table::new());
        };
        raw.parse::<toml::Table>().map_err(|err| {
            AuthError::Configuration(format!(
                "Failed to parse config file {}: {err}",
                self.path.display()
            ))
        })
    }

    fn write_document(&self, document: &toml::Table) -> Result<(), AuthError> {
        let serialized = toml::to_string(document)?;
        atomic_write(&self.path, serialized.as_bytes())
    }

    fn update<T>(
        &self,
        section: &str,
        apply: impl FnOnce(&mut toml::Table) -> T,
    ) -> Result<T, AuthError> {
        let mut document = self.read_document()?;
        let entry = document
            .entry(section.to_string())
            .or_insert_with(|| toml::Value::Table(toml::Table::new()));
        let toml::Value::Table(table) = entry else {
            return Err(AuthError::Configuration(format!(
                "Config key {section} in {} is not a section",
                self.path.display()
            )));
        };
        let result = apply(table);
        if table.is_empty() {
            document.remove(section);
        }
        self.write_document(&document)?;
        Ok(result)
    }
}

impl SectionStore for ConfigFile {
    fn get(&self, section: &str, key: &str) -> Result<Option<String>, AuthError> {
        Ok(self
            .get_section(section)?
            .and_then(|mut values| values.remove(key)))
    }

    fn set(&self, section: &str, key: &str, value: &str) -> Result<(), AuthError> {
        self.update(section, |table| {
            table.insert(key.to_string(), toml::Value::String(value.to_string()));
        })
    }

    fn remove(&self, section: &str, key: &str) -> Result<bool, AuthError> {
        if self.get(section, key)?.is_none() {
            return Ok(false);
        }
        self.update(section, |table| table.remove(key).is_some())
    }

    fn get_section(&self, section: &str) -> Result<Option<BTreeMap<String, String>>, AuthError> {
        let document = self.read_document()?;
        let Some(value) = document.get(section) else {
            return Ok(None);
        };
        let toml::Value::Table(table) = value else {
            return Err(AuthError::Configuration(format!(
                "Config key {section} in {} is not a section",
                self.path.display()
            )));
        };
        let values = table
            .iter()
            .map(|(key, value)| {
                let text = match value {
                    toml::Value::String(s) => s.clone(),
                    other => other.to_string(),
                };
                (key.clone(), text)
            })
            .collect();
        Ok(Some(values))
    }

    fn set_all(&self, section: &str, entries: &[(String, String)]) -> Result<(), AuthError> {
        self.update(section, |table| {
            for (key, value) in entries {
                table.insert(key.clone(), toml::Value::String(value.clone()));
            }
        })
    }

    fn remove_all(&self, section: &str, keys: &[String]) -> Result<usize, AuthError> {
        if self.get_section(section)?.is_none() {
            return Ok(0);
        }
        self.update(section, |table| {
            keys.iter()
                .filter(|key| table.remove(key.as_str()).is_some())
                .count()
        })
    }
}
