//! native-auth CLI binary entry point.

use native_auth::cli::{Cli, Commands};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("native_auth=info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse_args();
    let store = cli.store;

    let result = match cli.command {
        Commands::Login(args) => native_auth::cli::auth::handle_login(store, args).await,
        Commands::Status(target) => native_auth::cli::auth::handle_status(store, target).await,
        Commands::Logout(target) => native_auth::cli::auth::handle_logout(store, target).await,
    };

    if let Err(e) = result {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}
