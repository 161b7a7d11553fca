//! In-memory session state.

use crate::auth::{TokenPair, UserProfile};

/// Where the session is in its lifecycle.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LifecyclePhase {
    /// Stored tokens have not been read yet.
    #[default]
    Loading,
    Unauthenticated,
    /// An interactive sign-in is running.
    Authenticating,
    Authenticated,
    /// A rejected access token is being replaced.
    Refreshing,
}

impl std::fmt::Display for LifecyclePhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Loading => "loading",
            Self::Unauthenticated => "unauthenticated",
            Self::Authenticating => "authenticating",
            Self::Authenticated => "authenticated",
            Self::Refreshing => "refreshing",
        };
        f.write_str(s)
    }
}

/// The authenticated state of the running app.
///
/// Tokens are held as one [`TokenPair`] so an access token never exists
/// without its refresh token, and a user profile is only kept while tokens
/// are present.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Session {
    tokens: Option<TokenPair>,
    user: Option<UserProfile>,
    phase: LifecyclePhase,
}

impl Session {
    pub fn phase(&self) -> LifecyclePhase {
        self.phase
    }

    pub fn tokens(&self) -> Option<&TokenPair> {
        self.tokens.as_ref()
    }

    pub fn access_token(&self) -> Option<&str> {
        self.tokens.as_ref().map(|t| t.access_token.as_str())
    }

    pub fn refresh_token(&self) -> Option<&str> {
        self.tokens.as_ref().map(|t| t.refresh_token.as_str())
    }

    pub fn user(&self) -> Option<&UserProfile> {
        self.user.as_ref()
    }

    pub fn is_authenticated(&self) -> bool {
        self.tokens.is_some()
    }

    pub(crate) fn set_phase(&mut self, phase: LifecyclePhase) {
        self.phase = phase;
    }

    /// Install a freshly issued pair. The previous user is dropped.
    pub(crate) fn sign_in(&mut self, tokens: TokenPair) {
        *self = Self {
            tokens: Some(tokens),
            user: None,
            phase: LifecyclePhase::Authenticated,
        };
    }

    /// Install a refreshed pair for the same account, keeping the profile.
    ///
    /// Ignored once the session was cleared; returns whether it applied.
    pub(crate) fn replace_tokens(&mut self, tokens: TokenPair) -> bool {
        if self.tokens.is_none() {
            return false;
        }
        self.tokens = Some(tokens);
        if self.phase == LifecyclePhase::Refreshing {
            self.phase = LifecyclePhase::Authenticated;
        }
        true
    }

    /// Leave a transient phase for the one the tokens imply.
    pub(crate) fn settle_phase(&mut self) {
        self.phase = if self.tokens.is_some() {
            LifecyclePhase::Authenticated
        } else {
            LifecyclePhase::Unauthenticated
        };
    }

    /// Set the profile. Ignored while signed out.
    pub(crate) fn set_user(&mut self, user: Option<UserProfile>) {
        if self.tokens.is_some() {
            self.user = user;
        } else {
            self.user = None;
        }
    }

    pub(crate) fn clear(&mut self) {
        *self = Self {
            tokens: None,
            user: None,
            phase: LifecyclePhase::Unauthenticated,
        };
    }
}
