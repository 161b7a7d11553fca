//! Error types for the session client.

/// Unified error type for storage, network and sign-in failures.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The backend could not be reached (DNS, connect, TLS, broken body).
    #[error("Transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// The backend answered with a non-2xx status.
    ///
    /// `message` is taken from the JSON `message`/`error` field, the raw body,
    /// or `HTTP_<status>` when the body is empty.
    #[error("{message}")]
    Http { status: u16, message: String },

    /// No access token is available for an authenticated call.
    #[error("Unauthorized")]
    NotAuthenticated,

    /// The user dismissed the interactive sign-in.
    #[error("Sign-in cancelled")]
    Cancelled,

    /// The provider reported another sign-in already in progress.
    #[error("Another authentication session is in progress")]
    SignInInProgress,

    /// A 401 could not be recovered because the refresh attempt failed.
    #[error("Session expired")]
    RefreshExhausted,

    /// The OAuth provider returned an error on the redirect.
    #[error("Provider error: {0}")]
    Provider(String),

    /// The consent UI or sign-in SDK itself failed before any redirect.
    #[error("Sign-in prompt failed: {0}")]
    Prompt(String),

    /// The redirect did not carry a usable authorization code or state.
    #[error("Invalid authentication response: {0}")]
    InvalidCallback(String),

    /// Secure storage read/write failure.
    #[error("Storage error: {0}")]
    Storage(String),

    /// JSON (de)serialization failure.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Invalid configuration.
    #[error("Configuration error: {0}")]
    Config(String),
}

impl Error {
    /// Build an [`Error::Http`].
    pub fn http(status: u16, message: impl Into<String>) -> Self {
        Self::Http {
            status,
            message: message.into(),
        }
    }

    /// HTTP status carried by this error, if any.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Http { status, .. } => Some(*status),
            Self::Transport(e) => e.status().map(|s| s.as_u16()),
            _ => None,
        }
    }

    /// Whether this error means the access token was rejected.
    ///
    /// Matches a 401 status, or a message naming `HTTP_401` or equal to
    /// `Unauthorized` for backends that lose the status on the way.
    pub fn is_unauthorized(&self) -> bool {
        if self.status() == Some(401) {
            return true;
        }
        match self {
            Self::Http { message, .. } => message.contains("HTTP_401") || message == "Unauthorized",
            _ => false,
        }
    }

    /// Wrap a failure of the consent UI or SDK as [`Error::Prompt`].
    ///
    /// Cancellation and the provider lock keep their own meaning.
    pub fn into_prompt_failure(self) -> Self {
        match self {
            Self::Cancelled | Self::SignInInProgress | Self::Prompt(_) => self,
            other => Self::Prompt(other.to_string()),
        }
    }

    /// Whether this is a non-error end of an interactive sign-in.
    pub fn is_cancellation(&self) -> bool {
        matches!(self, Self::Cancelled)
    }
}

/// Result alias using the crate [`Error`].
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unauthorized_by_status() {
        assert!(Error::http(401, "token expired").is_unauthorized());
        assert!(!Error::http(403, "forbidden").is_unauthorized());
    }

    #[test]
    fn test_unauthorized_by_message() {
        assert!(Error::http(0, "HTTP_401").is_unauthorized());
        assert!(Error::http(500, "Unauthorized").is_unauthorized());
        assert!(!Error::http(500, "Unauthorized access denied").is_unauthorized());
    }

    #[test]
    fn test_not_authenticated_is_not_a_rejection() {
        assert!(!Error::NotAuthenticated.is_unauthorized());
        assert_eq!(Error::NotAuthenticated.status(), None);
    }

    #[test]
    fn test_http_display_is_message() {
        assert_eq!(Error::http(404, "User not found").to_string(), "User not found");
    }

    #[test]
    fn test_prompt_failure_keeps_cancel_and_lock() {
        assert!(Error::Cancelled.into_prompt_failure().is_cancellation());
        assert!(matches!(
            Error::SignInInProgress.into_prompt_failure(),
            Error::SignInInProgress
        ));
        assert!(matches!(
            Error::Storage("tty closed".into()).into_prompt_failure(),
            Error::Prompt(m) if m.contains("tty closed")
        ));
    }

    #[test]
    fn test_cancellation() {
        assert!(Error::Cancelled.is_cancellation());
        assert!(!Error::SignInInProgress.is_cancellation());
    }
}
