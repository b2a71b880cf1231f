//! CLI entry point for native-auth.

pub mod auth;

use clap::{Args, Parser, Subcommand, ValueEnum};

/// Native-app OAuth2 login
#[derive(Parser, Debug)]
#[command(name = "native-auth", version, about = "Native-app OAuth2 login and token storage")]
pub struct Cli {
    /// Where credentials are persisted
    #[arg(long, global = true, value_enum, default_value_t = StoreKind::Sectioned)]
    pub store: StoreKind,

    #[command(subcommand)]
    pub command: Commands,
}

/// Credential store backends.
#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum StoreKind {
    /// Flat keys in a section of the config file
    Sectioned,
    /// One JSON document per partition in the token directory
    Document,
}

/// Top-level CLI commands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the login flow (reuses valid stored credentials)
    Login(LoginArgs),
    /// Show stored credentials
    Status(TargetArgs),
    /// Revoke and delete stored credentials
    Logout(TargetArgs),
}

/// Which stored credential set a command acts on.
#[derive(Args, Debug, Clone, Default)]
pub struct TargetArgs {
    /// Client id of the native app
    #[arg(long)]
    pub client_id: Option<String>,

    /// Storage partition (defaults to the client id)
    #[arg(long)]
    pub section: Option<String>,
}

/// Arguments for `native-auth login`.
#[derive(Args, Debug, Default)]
pub struct LoginArgs {
    #[command(flatten)]
    pub target: TargetArgs,

    /// Space-delimited scopes to request
    #[arg(long)]
    pub scopes: Option<String>,

    /// Request refresh tokens
    #[arg(long)]
    pub refresh_tokens: bool,

    /// Persist the credentials after a successful login
    #[arg(long)]
    pub save: bool,

    /// Skip stored credentials and log in again
    #[arg(long)]
    pub force: bool,

    /// Paste the authorization code instead of running a local listener
    #[arg(long)]
    pub no_local_server: bool,

    /// Print the authorize URL instead of opening a browser
    #[arg(long)]
    pub no_browser: bool,

    /// Port for the local listener (0 picks a free one)
    #[arg(long)]
    pub port: Option<u16>,

    /// Extra flow option as key=value (value parsed as TOML, else a string)
    #[arg(short = 'o', long = "option", value_name = "KEY=VALUE")]
    pub options: Vec<String>,
}

impl Cli {
    /// Parse CLI arguments.
    pub fn parse_args() -> Self {
        Self::parse()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_login_with_flags_and_options() {
        let cli = Cli::try_parse_from([
            "native-auth",
            "login",
            "--save",
            "--no-browser",
            "--port",
            "0",
            "-o",
            "prefill_named_grant=laptop",
            "--section",
            "my-app",
        ])
        .unwrap();
        assert_eq!(cli.store, StoreKind::Sectioned);
        match cli.command {
            Commands::Login(args) => {
                assert!(args.save);
                assert!(args.no_browser);
                assert!(!args.force);
                assert_eq!(args.port, Some(0));
                assert_eq!(args.options, vec!["prefill_named_grant=laptop"]);
                assert_eq!(args.target.section.as_deref(), Some("my-app"));
            }
            other => panic!("expected Login, got {other:?}"),
        }
    }

    #[test]
    fn parse_status_with_document_store() {
        let cli = Cli::try_parse_from(["native-auth", "status", "--store", "document"]).unwrap();
        assert_eq!(cli.store, StoreKind::Document);
        assert!(matches!(cli.command, Commands::Status(_)));
    }

    #[test]
    fn parse_logout_with_client_id() {
        let cli =
            Cli::try_parse_from(["native-auth", "logout", "--client-id", "abc"]).unwrap();
        match cli.command {
            Commands::Logout(target) => assert_eq!(target.client_id.as_deref(), Some("abc")),
            other => panic!("expected Logout, got {other:?}"),
        }
    }
}
