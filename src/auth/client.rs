//! Remote authorization server: authorize URL, code exchange, revocation.

use std::collections::BTreeMap;

use async_trait::async_trait;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use bon::Builder;
use chrono::Utc;
use serde::Deserialize;
use sha2::{Digest, Sha256};

use super::{AuthError, CredentialRecord, CredentialSet};
use crate::config::AuthConfig;

/// Page that displays the authorization code for manual copy-and-paste.
pub const AUTH_CODE_REDIRECT: &str = "https://auth.globus.org/v2/web/auth-code";
/// `state` sent with every authorize request.
pub const DEFAULT_STATE: &str = "_default";

const AUTHORIZE_PATH: &str = "v2/oauth2/authorize";
const TOKEN_PATH: &str = "v2/oauth2/token";
const REVOKE_PATH: &str = "v2/oauth2/token/revoke";
const AUTH_CODE_PATH: &str = "v2/web/auth-code";

/// The remote endpoints the native-app flow talks to.
#[async_trait]
pub trait AuthorizationServer: Send + Sync {
    /// Authorize URL for `request`, with `additional_params` appended.
    fn authorize_url(
        &self,
        request: &AuthorizeRequest,
        additional_params: &BTreeMap<String, String>,
    ) -> Result<String, AuthError>;

    /// Exchange an authorization code for one record per resource server.
    async fn exchange_code(
        &self,
        request: &AuthorizeRequest,
        code: &str,
    ) -> Result<CredentialSet, AuthError>;

    async fn revoke_token(&self, client_id: &str, token: &str) -> Result<(), AuthError>;

    /// Redirect target used when no local listener captures the code.
    fn manual_redirect_uri(&self) -> String {
        AUTH_CODE_REDIRECT.to_string()
    }
}

/// One authorization attempt: client identity, redirect and PKCE material.
///
/// The verifier is generated fresh unless supplied.
///
/// # Example
/// ```
/// use native_auth::auth::AuthorizeRequest;
///
/// let request = AuthorizeRequest::builder()
///     .client_id("0af96eea-fec8-4d6e-aad2-c87feed8151c")
///     .scopes(vec!["openid".to_string()])
///     .redirect_uri("http://localhost:8890/")
///     .build();
/// assert_eq!(request.state, "_default");
/// assert_eq!(request.code_challenge().len(), 43);
/// ```
#[derive(Debug, Clone, Builder)]
pub struct AuthorizeRequest {
    #[builder(into)]
    pub client_id: String,
    pub scopes: Vec<String>,
    #[builder(into)]
    pub redirect_uri: String,
    /// Ask for refresh tokens (`access_type=offline`).
    #[builder(default)]
    pub refresh_tokens: bool,
    #[builder(into)]
    pub prefill_named_grant: Option<String>,
    #[builder(into, default = DEFAULT_STATE.to_string())]
    pub state: String,
    #[builder(into, default = generate_code_verifier())]
    pub code_verifier: String,
}

impl AuthorizeRequest {
    /// S256 challenge for the verifier.
    pub fn code_challenge(&self) -> String {
        compute_code_challenge(&self.code_verifier)
    }

    pub fn access_type(&self) -> &'static str {
        if self.refresh_tokens {
            "offline"
        } else {
            "online"
        }
    }

    /// Query parameters in the order they appear on the authorize URL.
    pub fn query_params(&self) -> Vec<(String, String)> {
        let mut params = vec![
            ("client_id".to_string(), self.client_id.clone()),
            ("redirect_uri".to_string(), self.redirect_uri.clone()),
            ("scope".to_string(), self.scopes.join(" ")),
            ("state".to_string(), self.state.clone()),
            ("response_type".to_string(), "code".to_string()),
            ("code_challenge".to_string(), self.code_challenge()),
            ("code_challenge_method".to_string(), "S256".to_string()),
            ("access_type".to_string(), self.access_type().to_string()),
        ];
        if let Some(label) = &self.prefill_named_grant {
            params.push(("prefill_named_grant".to_string(), label.clone()));
        }
        params
    }
}

/// reqwest-backed [`AuthorizationServer`] for a public native-app client.
///
/// # Example
/// ```no_run
/// use native_auth::auth::NativeAppClient;
/// use native_auth::config::AuthConfig;
///
/// let client = NativeAppClient::new(&AuthConfig::from_env()?)?;
/// println!("{}", client.token_url());
/// # Ok::<(), native_auth::auth::AuthError>(())
/// ```
#[derive(Debug, Clone)]
pub struct NativeAppClient {
    client: reqwest::Client,
    authorize_url: String,
    token_url: String,
    revoke_url: String,
    auth_code_url: String,
}

impl NativeAppClient {
    pub fn new(config: &AuthConfig) -> Result<Self, AuthError> {
        let client = reqwest::Client::builder()
            .timeout(config.http_timeout)
            .danger_accept_invalid_certs(!config.ssl_verify)
            .build()?;
        if !config.ssl_verify {
            tracing::warn!(service_url = %config.service_url, "TLS certificate verification disabled");
        }
        Ok(Self::with_client(client, &config.service_url))
    }

    /// Use an existing HTTP client against `service_url`.
    pub fn with_client(client: reqwest::Client, service_url: &str) -> Self {
        let base = service_url.trim_end_matches('/');
        Self {
            client,
            authorize_url: format!("{base}/{AUTHORIZE_PATH}"),
            token_url: format!("{base}/{TOKEN_PATH}"),
            revoke_url: format!("{base}/{REVOKE_PATH}"),
            auth_code_url: format!("{base}/{AUTH_CODE_PATH}"),
        }
    }

    pub fn token_url(&self) -> &str {
        &self.token_url
    }
}

#[async_trait]
impl AuthorizationServer for NativeAppClient {
    fn authorize_url(
        &self,
        request: &AuthorizeRequest,
        additional_params: &BTreeMap<String, String>,
    ) -> Result<String, AuthError> {
        let mut params = request.query_params();
        params.extend(
            additional_params
                .iter()
                .map(|(key, value)| (key.clone(), value.clone())),
        );
        Ok(build_url_with_params(&self.authorize_url, &params))
    }

    async fn exchange_code(
        &self,
        request: &AuthorizeRequest,
        code: &str,
    ) -> Result<CredentialSet, AuthError> {
        tracing::debug!(token_url = %self.token_url, "Exchanging authorization code");
        let resp = self
            .client
            .post(&self.token_url)
            .form(&[
                ("grant_type", "authorization_code"),
                ("code", code),
                ("redirect_uri", request.redirect_uri.as_str()),
                ("client_id", request.client_id.as_str()),
                ("code_verifier", request.code_verifier.as_str()),
            ])
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(AuthError::InvalidResponse(format!(
                "Token exchange failed with status {status}: {body}"
            )));
        }

        let body = resp.text().await?;
        let payload: TokenResponse = serde_json::from_str(&body).map_err(|err| {
            AuthError::InvalidResponse(format!("Malformed token response: {err}"))
        })?;
        Ok(credentials_from_response(payload, Utc::now().timestamp()))
    }

    async fn revoke_token(&self, client_id: &str, token: &str) -> Result<(), AuthError> {
        let resp = self
            .client
            .post(&self.revoke_url)
            .form(&[("token", token), ("client_id", client_id)])
            .send()
            .await?;

        if !resp.status().is_success() {
            return Err(AuthError::InvalidResponse(format!(
                "Token revocation failed with status {}",
                resp.status()
            )));
        }
        Ok(())
    }

    fn manual_redirect_uri(&self) -> String {
        self.auth_code_url.clone()
    }
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    #[serde(flatten)]
    primary: IssuedToken,
    #[serde(default)]
    other_tokens: Vec<IssuedToken>,
}

#[derive(Debug, Deserialize)]
struct IssuedToken {
    access_token: String,
    expires_in: i64,
    resource_server: String,
    scope: String,
    token_type: Option<String>,
    refresh_token: Option<String>,
}

fn credentials_from_response(payload: TokenResponse, now: i64) -> CredentialSet {
    std::iter::once(payload.primary)
        .chain(payload.other_tokens)
        .map(|issued| CredentialRecord {
            expires_at: now + issued.expires_in,
            resource_server: issued.resource_server,
            scope: issued.scope,
            access_token: issued.access_token,
            refresh_token: issued.refresh_token.filter(|token| !token.is_empty()),
            token_type: issued.token_type.filter(|kind| !kind.is_empty()),
        })
        .collect()
}

fn generate_code_verifier() -> String {
    let mut buf = [0u8; 32];
    for chunk in buf.chunks_mut(16) {
        let id = uuid::Uuid::new_v4();
        let bytes = id.as_bytes();
        let len = chunk.len().min(16);
        chunk[..len].copy_from_slice(&bytes[..len]);
    }
    URL_SAFE_NO_PAD.encode(buf)
}

fn compute_code_challenge(verifier: &str) -> String {
    let digest = Sha256::digest(verifier.as_bytes());
    URL_SAFE_NO_PAD.encode(digest)
}

fn build_url_with_params(base: &str, params: &[(String, String)]) -> String {
    let mut url = base.to_string();
    url.push(if url.contains('?') { '&' } else { '?' });
    for (i, (key, value)) in params.iter().enumerate() {
        if i > 0 {
            url.push('&');
        }
        url.push_str(&urlencoded(key));
        url.push('=');
        url.push_str(&urlencoded(value));
    }
    url
}

fn urlencoded(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for byte in input.bytes() {
        match byte {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' => {
                out.push(byte as char);
            }
            _ => {
                out.push('%');
                out.push_str(&format!("{byte:02X}"));
            }
        }
    }
    out
}
