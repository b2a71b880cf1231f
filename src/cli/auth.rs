//! CLI command handlers for login, status, and logout.

use std::str::FromStr;
use std::sync::Arc;

use chrono::{DateTime, Utc};

use super::{LoginArgs, StoreKind, TargetArgs};
use crate::auth::options::DEFAULT_CLIENT_ID;
use crate::auth::{AuthError, FlowOptions, NativeAppClient, NativeAppFlow, OptionName};
use crate::config::{AuthConfig, ConfigFile};
use crate::store::{revoke_and_clear, CredentialStore, DocumentStore, SectionedStore};

/// Open the credential store selected on the command line.
pub fn open_store(kind: StoreKind, config: &AuthConfig) -> Arc<dyn CredentialStore> {
    match kind {
        StoreKind::Sectioned => Arc::new(SectionedStore::new(Arc::new(ConfigFile::new(
            &config.config_file,
        )))),
        StoreKind::Document => Arc::new(DocumentStore::new(&config.token_dir)),
    }
}

/// Handle `native-auth login`.
pub async fn handle_login(
    kind: StoreKind,
    args: LoginArgs,
) -> Result<(), Box<dyn std::error::Error>> {
    let config = AuthConfig::from_env()?;
    let flow = NativeAppFlow::new(
        Arc::new(NativeAppClient::new(&config)?),
        open_store(kind, &config),
    );

    let overrides = login_overrides(&args)?;
    let credentials = flow.run_with_overrides(overrides).await?;

    println!("Logged in.");
    for record in credentials.records() {
        println!("  {}: {}", record.resource_server, record.scope);
    }
    if !args.save {
        println!("Credentials were not saved (pass --save to keep them).");
    }
    Ok(())
}

/// Handle `native-auth status`.
pub async fn handle_status(
    kind: StoreKind,
    target: TargetArgs,
) -> Result<(), Box<dyn std::error::Error>> {
    let config = AuthConfig::from_env()?;
    let store = open_store(kind, &config);
    let partition = partition(&target);

    let credentials = match store.load_unchecked(&partition) {
        Ok(credentials) if !credentials.is_empty() => credentials,
        Ok(_) | Err(AuthError::Configuration(_)) => {
            println!("{partition}: not logged in");
            return Ok(());
        }
        Err(err) => return Err(err.into()),
    };

    let now = Utc::now().timestamp();
    println!("{partition}:");
    for record in credentials.records() {
        let expires = DateTime::<Utc>::from_timestamp(record.expires_at, 0)
            .map(|at| at.format("%Y-%m-%d %H:%M UTC").to_string())
            .unwrap_or_else(|| record.expires_at.to_string());
        let state = if record.is_expired_at(now) {
            "expired"
        } else {
            "valid"
        };
        println!(
            "  {}: {state} (expires {expires}), scopes: {}",
            record.resource_server, record.scope
        );
    }
    Ok(())
}

/// Handle `native-auth logout`.
pub async fn handle_logout(
    kind: StoreKind,
    target: TargetArgs,
) -> Result<(), Box<dyn std::error::Error>> {
    let config = AuthConfig::from_env()?;
    let store = open_store(kind, &config);
    let server = NativeAppClient::new(&config)?;
    let partition = partition(&target);
    let client_id = target.client_id.as_deref().unwrap_or(DEFAULT_CLIENT_ID);

    if revoke_and_clear(store.as_ref(), &server, &partition, client_id).await? {
        println!("Logged out of {partition}");
    } else {
        println!("{partition}: nothing stored");
    }
    Ok(())
}

fn partition(target: &TargetArgs) -> String {
    target
        .section
        .clone()
        .or_else(|| target.client_id.clone())
        .unwrap_or_else(|| DEFAULT_CLIENT_ID.to_string())
}

/// Translate login flags into a flow override table.
///
/// `--option` entries are applied last and go through the same allow-list
/// as the typed flags.
pub fn login_overrides(args: &LoginArgs) -> Result<toml::Table, AuthError> {
    let mut table = toml::Table::new();
    let mut set = |key: &str, value: toml::Value| {
        table.insert(key.to_string(), value);
    };

    if let Some(client_id) = &args.target.client_id {
        set("client_id", client_id.clone().into());
    }
    if let Some(section) = &args.target.section {
        set("config_section", section.clone().into());
    }
    if let Some(scopes) = &args.scopes {
        set("requested_scopes", scopes.clone().into());
    }
    if let Some(port) = args.port {
        set("server_port", i64::from(port).into());
    }
    for (flag, key) in [
        (args.refresh_tokens, "refresh_tokens"),
        (args.save, "save_tokens"),
        (args.force, "force_login"),
        (args.no_local_server, "no_local_server"),
        (args.no_browser, "no_browser"),
    ] {
        if flag {
            set(key, true.into());
        }
    }

    for raw in &args.options {
        let (key, value) = raw.split_once('=').ok_or_else(|| {
            AuthError::Usage(format!("Expected KEY=VALUE for --option, got {raw:?}"))
        })?;
        let key = key.trim();
        table.insert(key.to_string(), parse_option_value(key, value.trim()));
    }

    FlowOptions::from_overrides(table.clone())?;
    Ok(table)
}

fn parse_option_value(key: &str, raw: &str) -> toml::Value {
    let literal = match OptionName::from_str(key) {
        Ok(
            OptionName::ClientId
            | OptionName::RedirectUri
            | OptionName::PrefillNamedGrant
            | OptionName::ServerHostname
            | OptionName::ConfigSection,
        ) => true,
        Ok(OptionName::RequestedScopes) => !raw.starts_with('['),
        _ => false,
    };
    if literal {
        return toml::Value::String(raw.to_string());
    }
    format!("value = {raw}")
        .parse::<toml::Table>()
        .ok()
        .and_then(|mut parsed| parsed.remove("value"))
        .unwrap_or_else(|| toml::Value::String(raw.to_string()))
}
