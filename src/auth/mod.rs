//! Native-app authorization-code flow: options, listener, client and orchestrator.

pub mod client;
pub mod credential;
pub mod error;
pub mod flow;
pub mod listener;
pub mod options;

pub use client::{AuthorizationServer, AuthorizeRequest, NativeAppClient, AUTH_CODE_REDIRECT, DEFAULT_STATE};
pub use credential::{CredentialRecord, CredentialSet};
pub use error::AuthError;
pub use flow::{BrowserLauncher, NativeAppFlow, Prompter, SystemBrowser, TerminalPrompter, CODE_PROMPT};
pub use listener::CallbackListener;
pub use options::{FlowOptions, OptionName};
