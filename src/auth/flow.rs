//! Native-app flow orchestration.

use std::sync::Arc;

use async_trait::async_trait;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};

use super::{
    AuthError, AuthorizationServer, AuthorizeRequest, CallbackListener, CredentialSet, FlowOptions,
};
use crate::store::{revoke_and_clear, CredentialStore};

/// Prompt printed before reading a pasted authorization code.
pub const CODE_PROMPT: &str = "Enter the resulting Authorization Code here: ";

const REMOTE_SESSION_VARS: [&str; 3] = ["SSH_CLIENT", "SSH_TTY", "SSH_CONNECTION"];

/// Opens the authorize URL for the user.
pub trait BrowserLauncher: Send + Sync {
    /// `true` if a browser was launched.
    fn open(&self, url: &str) -> bool;
}

/// Launches the system browser, except in remote (SSH) sessions.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemBrowser;

impl BrowserLauncher for SystemBrowser {
    fn open(&self, url: &str) -> bool {
        if is_remote_session(|name| std::env::var_os(name).is_some()) {
            tracing::debug!("Remote session detected; not launching a browser");
            return false;
        }
        match webbrowser::open(url) {
            Ok(()) => true,
            Err(err) => {
                tracing::debug!(error = %err, "Browser launch failed");
                false
            }
        }
    }
}

fn is_remote_session(is_set: impl Fn(&str) -> bool) -> bool {
    REMOTE_SESSION_VARS.iter().any(|name| is_set(name))
}

/// User-facing side of the flow: URL display and manual code entry.
#[async_trait]
pub trait Prompter: Send + Sync {
    fn show_url(&self, url: &str);
    /// Read one line after printing `prompt`.
    async fn read_code(&self, prompt: &str) -> Result<String, AuthError>;
}

/// Writes to stderr and reads from stdin.
#[derive(Debug, Clone, Copy, Default)]
pub struct TerminalPrompter;

#[async_trait]
impl Prompter for TerminalPrompter {
    fn show_url(&self, url: &str) {
        eprintln!("Please paste the following URL in a browser:\n{url}");
    }

    async fn read_code(&self, prompt: &str) -> Result<String, AuthError> {
        let mut stderr = tokio::io::stderr();
        stderr.write_all(prompt.as_bytes()).await?;
        stderr.flush().await?;

        let mut line = String::new();
        BufReader::new(tokio::io::stdin())
            .read_line(&mut line)
            .await?;
        Ok(line)
    }
}

/// Drives one login: cached credentials first, then a fresh authorization.
///
/// # Example
/// ```no_run
/// use std::sync::Arc;
/// use native_auth::auth::{FlowOptions, NativeAppClient, NativeAppFlow};
/// use native_auth::config::{AuthConfig, ConfigFile};
/// use native_auth::store::SectionedStore;
///
/// # async fn example() -> Result<(), native_auth::auth::AuthError> {
/// let config = AuthConfig::from_env()?;
/// let server = Arc::new(NativeAppClient::new(&config)?);
/// let store = Arc::new(SectionedStore::new(Arc::new(ConfigFile::new(&config.config_file))));
/// let flow = NativeAppFlow::new(server, store);
///
/// let credentials = flow
///     .run(FlowOptions {
///         save_tokens: true,
///         ..FlowOptions::default()
///     })
///     .await?;
/// println!("{:?}", credentials.resource_servers().collect::<Vec<_>>());
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct NativeAppFlow {
    server: Arc<dyn AuthorizationServer>,
    store: Arc<dyn CredentialStore>,
    browser: Arc<dyn BrowserLauncher>,
    prompter: Arc<dyn Prompter>,
}

impl std::fmt::Debug for NativeAppFlow {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NativeAppFlow").finish_non_exhaustive()
    }
}

impl NativeAppFlow {
    pub fn new(server: Arc<dyn AuthorizationServer>, store: Arc<dyn CredentialStore>) -> Self {
        Self {
            server,
            store,
            browser: Arc::new(SystemBrowser),
            prompter: Arc::new(TerminalPrompter),
        }
    }

    pub fn with_browser(mut self, browser: Arc<dyn BrowserLauncher>) -> Self {
        self.browser = browser;
        self
    }

    pub fn with_prompter(mut self, prompter: Arc<dyn Prompter>) -> Self {
        self.prompter = prompter;
        self
    }

    pub fn store(&self) -> &Arc<dyn CredentialStore> {
        &self.store
    }

    pub fn server(&self) -> &Arc<dyn AuthorizationServer> {
        &self.server
    }

    /// Run with a loosely typed override table; see [`FlowOptions::from_overrides`].
    pub async fn run_with_overrides(
        &self,
        overrides: toml::Table,
    ) -> Result<CredentialSet, AuthError> {
        let options = FlowOptions::from_overrides(overrides)?;
        self.run(options).await
    }

    pub async fn run(&self, options: FlowOptions) -> Result<CredentialSet, AuthError> {
        let partition = options.partition().to_string();
        let scopes = options.scopes();

        if !options.force_login {
            match self
                .store
                .load(&partition, &scopes, options.check_tokens_expired)
            {
                Ok(credentials) => {
                    tracing::info!(partition = %partition, "Using stored credentials");
                    return Ok(credentials);
                }
                Err(err) => {
                    tracing::debug!(partition = %partition, error = %err, "Stored credentials unusable; starting a new login");
                }
            }
        }

        match revoke_and_clear(
            self.store.as_ref(),
            self.server.as_ref(),
            &partition,
            &options.client_id,
        )
        .await
        {
            Ok(true) => tracing::debug!(partition = %partition, "Cleared stale credentials"),
            Ok(false) => {}
            Err(err) => {
                tracing::warn!(partition = %partition, error = %err, "Failed to clear stale credentials")
            }
        }

        let listener = if options.uses_local_server() {
            Some(
                CallbackListener::bind((options.server_hostname.as_str(), options.server_port))
                    .await?,
            )
        } else {
            None
        };
        let redirect_uri = options.redirect_target(
            listener.as_ref().map(CallbackListener::port),
            &self.server.manual_redirect_uri(),
        );

        let request = AuthorizeRequest::builder()
            .client_id(options.client_id.clone())
            .scopes(options.scopes())
            .redirect_uri(redirect_uri)
            .refresh_tokens(options.refresh_tokens)
            .maybe_prefill_named_grant(options.prefill_named_grant.clone())
            .build();
        let url = self
            .server
            .authorize_url(&request, &options.additional_auth_params)?;
        self.present(&url, options.no_browser);

        let code = match listener {
            Some(listener) => {
                tracing::info!(addr = %listener.local_addr(), "Waiting for authorization redirect");
                listener.wait_for_code().await?
            }
            None => {
                let entered = self.prompter.read_code(CODE_PROMPT).await?;
                let entered = entered.trim();
                if entered.is_empty() {
                    return Err(AuthError::Usage("no authorization code entered".to_string()));
                }
                entered.to_string()
            }
        };

        let credentials = self.server.exchange_code(&request, &code).await?;
        tracing::info!(
            partition = %partition,
            resource_servers = credentials.len(),
            "Authorization code exchanged"
        );

        if options.save_tokens {
            self.store.save(&partition, &credentials)?;
        }
        Ok(credentials)
    }

    fn present(&self, url: &str, no_browser: bool) {
        if !no_browser && self.browser.open(url) {
            return;
        }
        self.prompter.show_url(url);
    }
}
