//! native-auth: OAuth2 native-app login for command-line tools.
//!
//! Runs the installed-application authorization-code flow (PKCE, local
//! redirect capture or manual code entry) and persists the resulting
//! credentials in either a sectioned config file or a JSON token document.
//!
//! # Quick Start
//!
//! ```no_run
//! use std::sync::Arc;
//! use native_auth::auth::{FlowOptions, NativeAppClient, NativeAppFlow};
//! use native_auth::config::AuthConfig;
//! use native_auth::store::DocumentStore;
//!
//! # async fn example() -> Result<(), native_auth::auth::AuthError> {
//! let config = AuthConfig::from_env()?;
//! let flow = NativeAppFlow::new(
//!     Arc::new(NativeAppClient::new(&config)?),
//!     Arc::new(DocumentStore::new(&config.token_dir)),
//! );
//! let credentials = flow
//!     .run(FlowOptions {
//!         save_tokens: true,
//!         ..FlowOptions::default()
//!     })
//!     .await?;
//! for record in credentials.records() {
//!     println!("{}: {}", record.resource_server, record.scope);
//! }
//! # Ok(())
//! # }
//! ```

pub mod auth;
pub mod config;
pub mod store;
pub mod util;

#[cfg(feature = "cli")]
pub mod cli;
