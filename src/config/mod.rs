//! Runtime configuration (explicit handle; code > env > defaults).

pub mod file;

pub use file::{ConfigFile, SectionStore};

use std::path::PathBuf;
use std::time::Duration;

use crate::auth::AuthError;

/// Default Globus Auth service root.
pub const DEFAULT_SERVICE_URL: &str = "https://auth.globus.org/";
const DEFAULT_HTTP_TIMEOUT_SECS: f64 = 60.0;

/// Resolved configuration for the auth client and the token stores.
///
/// There is no process-wide instance: build one with [`AuthConfig::from_env`]
/// (or [`AuthConfig::default`]) and pass it to whatever needs it.
#[derive(Debug, Clone)]
pub struct AuthConfig {
    /// Root URL of the authorization service.
    pub service_url: String,
    pub http_timeout: Duration,
    pub ssl_verify: bool,
    /// Sectioned config file used by [`crate::store::SectionedStore`].
    pub config_file: PathBuf,
    /// Directory holding [`crate::store::DocumentStore`] documents.
    pub token_dir: PathBuf,
}

impl Default for AuthConfig {
    fn default() -> Self {
        let base = default_base_dir();
        Self {
            service_url: DEFAULT_SERVICE_URL.to_string(),
            http_timeout: Duration::from_secs_f64(DEFAULT_HTTP_TIMEOUT_SECS),
            ssl_verify: true,
            config_file: base.join("native-apps.toml"),
            token_dir: base.join("tokens"),
        }
    }
}

impl AuthConfig {
    /// Load from environment variables (`NATIVE_AUTH_*`), reading `.env` if present.
    pub fn from_env() -> Result<Self, AuthError> {
        let _ = dotenvy::dotenv();
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Resolve from an arbitrary variable lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, AuthError> {
        let mut config = Self::default();

        if let Some(url) = lookup("NATIVE_AUTH_SERVICE_URL") {
            config.service_url = url;
        }
        if let Some(raw) = lookup("NATIVE_AUTH_HTTP_TIMEOUT") {
            let secs: f64 = raw.trim().parse().map_err(|_| {
                AuthError::Configuration(format!("Invalid NATIVE_AUTH_HTTP_TIMEOUT: {raw}"))
            })?;
            if !secs.is_finite() || secs < 0.0 {
                return Err(AuthError::Configuration(format!(
                    "Invalid NATIVE_AUTH_HTTP_TIMEOUT: {raw}"
                )));
            }
            config.http_timeout = Duration::from_secs_f64(secs);
        }
        if let Some(raw) = lookup("NATIVE_AUTH_SSL_VERIFY") {
            config.ssl_verify = parse_bool(&raw).ok_or_else(|| {
                AuthError::Configuration(format!("Invalid NATIVE_AUTH_SSL_VERIFY: {raw}"))
            })?;
        }
        if let Some(path) = lookup("NATIVE_AUTH_CONFIG_FILE") {
            config.config_file = PathBuf::from(path);
        }
        if let Some(path) = lookup("NATIVE_AUTH_TOKEN_DIR") {
            config.token_dir = PathBuf::from(path);
        }

        tracing::debug!(
            service_url = %config.service_url,
            config_file = %config.config_file.display(),
            "Resolved auth configuration"
        );
        Ok(config)
    }

    pub fn with_service_url(mut self, url: impl Into<String>) -> Self {
        self.service_url = url.into();
        self
    }

    pub fn with_config_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.config_file = path.into();
        self
    }

    pub fn with_token_dir(mut self, path: impl Into<PathBuf>) -> Self {
        self.token_dir = path.into();
        self
    }
}

/// Parse the usual config spellings of a boolean.
pub fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "yes" | "true" | "on" => Some(true),
        "0" | "no" | "false" | "off" => Some(false),
        _ => None,
    }
}

fn default_base_dir() -> PathBuf {
    directories::UserDirs::new()
        .map(|dirs| dirs.home_dir().join(".native-auth"))
        .unwrap_or_else(|| PathBuf::from(".native-auth"))
}
