#![allow(dead_code)]

use std::collections::{BTreeMap, HashMap};
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::Utc;
use native_auth::auth::{
    AuthError, AuthorizationServer, AuthorizeRequest, BrowserLauncher, CredentialRecord,
    CredentialSet, Prompter,
};
use native_auth::store::CredentialStore;
use reqwest::Url;

#[derive(Default)]
pub struct InMemoryCredentialStore {
    sets: Mutex<HashMap<String, CredentialSet>>,
}

impl InMemoryCredentialStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn seed(&self, partition: &str, credentials: CredentialSet) {
        self.sets
            .lock()
            .expect("store lock poisoned")
            .insert(partition.to_string(), credentials);
    }

    pub fn get(&self, partition: &str) -> Option<CredentialSet> {
        self.sets
            .lock()
            .expect("store lock poisoned")
            .get(partition)
            .cloned()
    }
}

impl CredentialStore for InMemoryCredentialStore {
    fn save(&self, partition: &str, credentials: &CredentialSet) -> Result<(), AuthError> {
        self.sets
            .lock()
            .expect("store lock poisoned")
            .entry(partition.to_string())
            .or_default()
            .extend(credentials.clone());
        Ok(())
    }

    fn load_unchecked(&self, partition: &str) -> Result<CredentialSet, AuthError> {
        self.get(partition).ok_or_else(|| {
            AuthError::Configuration(format!("nothing stored for {partition}"))
        })
    }

    fn remove(&self, partition: &str) -> Result<bool, AuthError> {
        Ok(self
            .sets
            .lock()
            .expect("store lock poisoned")
            .remove(partition)
            .is_some())
    }
}

/// Exchange call observed by [`MockAuthServer`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Exchange {
    pub code: String,
    pub redirect_uri: String,
    pub code_verifier: String,
}

pub struct MockAuthServer {
    issued: CredentialSet,
    fail_revoke: bool,
    pub authorize_urls: Mutex<Vec<String>>,
    pub exchanges: Mutex<Vec<Exchange>>,
    pub revoked: Mutex<Vec<String>>,
}

impl MockAuthServer {
    pub fn issuing(issued: CredentialSet) -> Self {
        Self {
            issued,
            fail_revoke: false,
            authorize_urls: Mutex::new(Vec::new()),
            exchanges: Mutex::new(Vec::new()),
            revoked: Mutex::new(Vec::new()),
        }
    }

    pub fn failing_revoke(mut self) -> Self {
        self.fail_revoke = true;
        self
    }

    pub fn exchanges(&self) -> Vec<Exchange> {
        self.exchanges.lock().expect("lock").clone()
    }

    pub fn revoked(&self) -> Vec<String> {
        self.revoked.lock().expect("lock").clone()
    }

    pub fn authorize_urls(&self) -> Vec<String> {
        self.authorize_urls.lock().expect("lock").clone()
    }
}

#[async_trait]
impl AuthorizationServer for MockAuthServer {
    fn authorize_url(
        &self,
        request: &AuthorizeRequest,
        additional_params: &BTreeMap<String, String>,
    ) -> Result<String, AuthError> {
        let mut url = Url::parse("https://auth.test/v2/oauth2/authorize")
            .map_err(|e| AuthError::InvalidResponse(e.to_string()))?;
        {
            let mut query = url.query_pairs_mut();
            for (key, value) in request.query_params() {
                query.append_pair(&key, &value);
            }
            for (key, value) in additional_params {
                query.append_pair(key, value);
            }
        }
        self.authorize_urls
            .lock()
            .expect("lock")
            .push(url.to_string());
        Ok(url.to_string())
    }

    async fn exchange_code(
        &self,
        request: &AuthorizeRequest,
        code: &str,
    ) -> Result<CredentialSet, AuthError> {
        self.exchanges.lock().expect("lock").push(Exchange {
            code: code.to_string(),
            redirect_uri: request.redirect_uri.clone(),
            code_verifier: request.code_verifier.clone(),
        });
        Ok(self.issued.clone())
    }

    async fn revoke_token(&self, _client_id: &str, token: &str) -> Result<(), AuthError> {
        self.revoked.lock().expect("lock").push(token.to_string());
        if self.fail_revoke {
            return Err(AuthError::Network("revocation endpoint down".to_string()));
        }
        Ok(())
    }
}

/// Browser stand-in. Optionally "completes" the login by requesting the
/// `redirect_uri` from the authorize URL with `redirect_query` appended.
pub struct MockBrowser {
    launches: bool,
    redirect_query: Option<String>,
    pub opened: Mutex<Vec<String>>,
}

impl MockBrowser {
    /// Launches and redirects back with `query` (e.g. `code=abc`).
    pub fn redirecting(query: &str) -> Self {
        Self {
            launches: true,
            redirect_query: Some(query.to_string()),
            opened: Mutex::new(Vec::new()),
        }
    }

    /// Launches but never redirects.
    pub fn launching() -> Self {
        Self {
            launches: true,
            redirect_query: None,
            opened: Mutex::new(Vec::new()),
        }
    }

    /// Fails to launch.
    pub fn unavailable() -> Self {
        Self {
            launches: false,
            redirect_query: None,
            opened: Mutex::new(Vec::new()),
        }
    }

    pub fn opened(&self) -> Vec<String> {
        self.opened.lock().expect("lock").clone()
    }
}

impl BrowserLauncher for MockBrowser {
    fn open(&self, url: &str) -> bool {
        self.opened.lock().expect("lock").push(url.to_string());
        if !self.launches {
            return false;
        }
        if let Some(query) = &self.redirect_query {
            let redirect = redirect_uri_of(url).replace("localhost", "127.0.0.1");
            let target = format!("{redirect}?{query}");
            tokio::spawn(async move {
                let _ = reqwest::get(&target).await;
            });
        }
        true
    }
}

pub struct MockPrompter {
    answer: String,
    pub shown: Mutex<Vec<String>>,
    pub prompts: Mutex<Vec<String>>,
}

impl MockPrompter {
    pub fn answering(answer: &str) -> Self {
        Self {
            answer: answer.to_string(),
            shown: Mutex::new(Vec::new()),
            prompts: Mutex::new(Vec::new()),
        }
    }

    pub fn shown(&self) -> Vec<String> {
        self.shown.lock().expect("lock").clone()
    }

    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().expect("lock").clone()
    }
}

#[async_trait]
impl Prompter for MockPrompter {
    fn show_url(&self, url: &str) {
        self.shown.lock().expect("lock").push(url.to_string());
    }

    async fn read_code(&self, prompt: &str) -> Result<String, AuthError> {
        self.prompts.lock().expect("lock").push(prompt.to_string());
        Ok(self.answer.clone())
    }
}

pub fn redirect_uri_of(authorize_url: &str) -> String {
    Url::parse(authorize_url)
        .expect("authorize url")
        .query_pairs()
        .find(|(key, _)| key == "redirect_uri")
        .map(|(_, value)| value.into_owned())
        .expect("redirect_uri parameter")
}

pub fn query_param(authorize_url: &str, name: &str) -> Option<String> {
    Url::parse(authorize_url)
        .expect("authorize url")
        .query_pairs()
        .find(|(key, _)| key == name)
        .map(|(_, value)| value.into_owned())
}

pub fn record(resource_server: &str, scope: &str, expires_in: i64) -> CredentialRecord {
    CredentialRecord {
        resource_server: resource_server.to_string(),
        scope: scope.to_string(),
        access_token: format!("{resource_server}-access"),
        refresh_token: Some(format!("{resource_server}-refresh")),
        token_type: Some("Bearer".to_string()),
        expires_at: Utc::now().timestamp() + expires_in,
    }
}

pub fn set_of(records: Vec<CredentialRecord>) -> CredentialSet {
    records.into_iter().collect()
}
