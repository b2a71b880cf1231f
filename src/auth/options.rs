use std::collections::BTreeMap;
use std::str::FromStr;

use serde::{Deserialize, Deserializer};
use strum::{Display, EnumString, VariantNames};

use super::AuthError;

/// Default public client registered for native apps.
pub const DEFAULT_CLIENT_ID: &str = "0af96eea-fec8-4d6e-aad2-c87feed8151c";
/// Default requested scopes, space-delimited.
pub const DEFAULT_SCOPES: &str =
    "openid profile email urn:globus:auth:scope:transfer.api.globus.org:all";
pub const DEFAULT_SERVER_HOSTNAME: &str = "127.0.0.1";
pub const DEFAULT_SERVER_PORT: u16 = 8890;

/// Every option name the flow accepts in loosely typed overrides.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, VariantNames)]
#[strum(serialize_all = "snake_case")]
pub enum OptionName {
    ClientId,
    RequestedScopes,
    RedirectUri,
    RefreshTokens,
    PrefillNamedGrant,
    AdditionalAuthParams,
    SaveTokens,
    CheckTokensExpired,
    ForceLogin,
    NoLocalServer,
    NoBrowser,
    ServerHostname,
    ServerPort,
    ConfigSection,
}

/// Options for one run of the native-app flow.
///
/// Use struct-update syntax over [`FlowOptions::default`] for typed
/// overrides, or [`FlowOptions::from_overrides`] for a loosely typed table.
///
/// # Example
/// ```
/// use native_auth::auth::FlowOptions;
///
/// let options = FlowOptions {
///     save_tokens: true,
///     config_section: Some("my-app".to_string()),
///     ..FlowOptions::default()
/// };
/// assert_eq!(options.partition(), "my-app");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct FlowOptions {
    pub client_id: String,
    /// Ordered and de-duplicated.
    #[serde(deserialize_with = "deserialize_scopes")]
    pub requested_scopes: Vec<String>,
    /// Explicit redirect target. When unset it is derived from the listener's
    /// bound port, or the provider's auth-code page without a listener.
    pub redirect_uri: Option<String>,
    /// Ask for refresh tokens (`access_type=offline`).
    pub refresh_tokens: bool,
    /// Label shown on the consent page.
    pub prefill_named_grant: Option<String>,
    /// Extra parameters appended to the authorize URL.
    pub additional_auth_params: BTreeMap<String, String>,
    pub save_tokens: bool,
    pub check_tokens_expired: bool,
    pub force_login: bool,
    pub no_local_server: bool,
    pub no_browser: bool,
    pub server_hostname: String,
    /// `0` binds an ephemeral port.
    pub server_port: u16,
    /// Storage partition; falls back to `client_id`.
    pub config_section: Option<String>,
}

impl Default for FlowOptions {
    fn default() -> Self {
        Self {
            client_id: DEFAULT_CLIENT_ID.to_string(),
            requested_scopes: split_scopes(DEFAULT_SCOPES),
            redirect_uri: None,
            refresh_tokens: false,
            prefill_named_grant: default_grant_label(),
            additional_auth_params: BTreeMap::new(),
            save_tokens: false,
            check_tokens_expired: true,
            force_login: false,
            no_local_server: false,
            no_browser: false,
            server_hostname: DEFAULT_SERVER_HOSTNAME.to_string(),
            server_port: DEFAULT_SERVER_PORT,
            config_section: None,
        }
    }
}

impl FlowOptions {
    /// Build options from a loosely typed table.
    ///
    /// Every key is checked against [`OptionName`] before any value is
    /// looked at, so a typo fails fast with [`AuthError::Usage`].
    pub fn from_overrides(overrides: toml::Table) -> Result<Self, AuthError> {
        validate_option_names(overrides.keys().map(String::as_str))?;
        toml::Value::Table(overrides)
            .try_into::<FlowOptions>()
            .map_err(|err| AuthError::Usage(format!("Invalid option value: {err}")))
    }

    /// Storage partition for this flow.
    pub fn partition(&self) -> &str {
        self.config_section.as_deref().unwrap_or(&self.client_id)
    }

    pub fn uses_local_server(&self) -> bool {
        !self.no_local_server
    }

    /// Requested scopes in order, space-joined entries split, duplicates
    /// dropped.
    pub fn scopes(&self) -> Vec<String> {
        split_entries(&self.requested_scopes)
    }

    /// Requested scopes as one space-delimited string.
    pub fn scope_string(&self) -> String {
        self.scopes().join(" ")
    }

    /// Redirect target given the listener's bound port, if any.
    ///
    /// `manual_redirect` is the provider page that displays the code for
    /// copy-and-paste.
    pub fn redirect_target(&self, bound_port: Option<u16>, manual_redirect: &str) -> String {
        if let Some(uri) = &self.redirect_uri {
            return uri.clone();
        }
        match bound_port {
            Some(port) => format!("http://localhost:{port}/"),
            None => manual_redirect.to_string(),
        }
    }
}

/// Reject any name outside the allow-list, naming all offenders at once.
pub fn validate_option_names<'a>(names: impl IntoIterator<Item = &'a str>) -> Result<(), AuthError> {
    let unknown: Vec<&str> = names
        .into_iter()
        .filter(|name| OptionName::from_str(name).is_err())
        .collect();
    if unknown.is_empty() {
        return Ok(());
    }
    Err(AuthError::Usage(format!(
        "Unknown option(s): {}. Valid options are: {}",
        unknown.join(", "),
        OptionName::VARIANTS.join(", ")
    )))
}

fn default_grant_label() -> Option<String> {
    ["HOSTNAME", "COMPUTERNAME"]
        .into_iter()
        .filter_map(|name| std::env::var(name).ok())
        .map(|value| value.trim().to_string())
        .find(|value| !value.is_empty())
}

fn split_scopes(raw: &str) -> Vec<String> {
    dedupe(raw.split_whitespace().map(str::to_string))
}

fn dedupe(scopes: impl Iterator<Item = String>) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();
    for scope in scopes {
        if !out.contains(&scope) {
            out.push(scope);
        }
    }
    out
}

fn split_entries(entries: &[String]) -> Vec<String> {
    dedupe(
        entries
            .iter()
            .flat_map(|entry| entry.split_whitespace())
            .map(str::to_string),
    )
}

fn deserialize_scopes<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Scopes {
        Joined(String),
        List(Vec<String>),
    }

    Ok(match Scopes::deserialize(deserializer)? {
        Scopes::Joined(raw) => split_scopes(&raw),
        Scopes::List(list) => split_entries(&list),
    })
}
