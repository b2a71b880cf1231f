use thiserror::Error;

/// Errors raised by the native-app flow, its listener and the token stores.
#[derive(Debug, Error)]
pub enum AuthError {
    /// Persisted credentials are missing, unreadable or malformed.
    #[error("Configuration error: {0}")]
    Configuration(String),
    /// Loaded credentials are at or past their expiry time.
    #[error("Loaded credentials expired for: {}", resource_servers.join(", "))]
    ExpiredCredentials { resource_servers: Vec<String> },
    /// Stored scopes are broader than the requested ones.
    #[error("Requested scopes differ from loaded scopes. Requested: {requested:?}, Loaded: {loaded:?}")]
    ScopeMismatch {
        requested: Vec<String>,
        loaded: Vec<String>,
    },
    /// The provider redirected with an error, or the listener could not run.
    #[error("Local server error: {0}")]
    LocalListener(String),
    /// The caller passed options the flow does not understand.
    #[error("Usage error: {0}")]
    Usage(String),
    #[error("Invalid response: {0}")]
    InvalidResponse(String),
    #[error("Network error: {0}")]
    Network(String),
    #[error("IO error: {0}")]
    Io(String),
    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl AuthError {
    /// Whether this error came out of credential validation, which the flow
    /// treats as "run a new login" rather than a failure.
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            Self::Configuration(_) | Self::ExpiredCredentials { .. } | Self::ScopeMismatch { .. }
        )
    }
}

impl From<reqwest::Error> for AuthError {
    fn from(error: reqwest::Error) -> Self {
        Self::Network(error.to_string())
    }
}

impl From<std::io::Error> for AuthError {
    fn from(error: std::io::Error) -> Self {
        Self::Io(error.to_string())
    }
}

impl From<serde_json::Error> for AuthError {
    fn from(error: serde_json::Error) -> Self {
        Self::Serialization(error.to_string())
    }
}

impl From<toml::de::Error> for AuthError {
    fn from(error: toml::de::Error) -> Self {
        Self::Serialization(error.to_string())
    }
}

impl From<toml::ser::Error> for AuthError {
    fn from(error: toml::ser::Error) -> Self {
        Self::Serialization(error.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validation_errors_are_flagged() {
        assert!(AuthError::Configuration("missing".into()).is_validation());
        assert!(AuthError::ExpiredCredentials {
            resource_servers: vec!["auth.globus.org".into()]
        }
        .is_validation());
        assert!(AuthError::ScopeMismatch {
            requested: vec![],
            loaded: vec![]
        }
        .is_validation());
        assert!(!AuthError::LocalListener("denied".into()).is_validation());
        assert!(!AuthError::Usage("bad".into()).is_validation());
    }

    #[test]
    fn expired_message_names_resource_servers() {
        let err = AuthError::ExpiredCredentials {
            resource_servers: vec!["auth.globus.org".into(), "transfer.api.globus.org".into()],
        };
        assert_eq!(
            err.to_string(),
            "Loaded credentials expired for: auth.globus.org, transfer.api.globus.org"
        );
    }
}
