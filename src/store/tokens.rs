//! Token-pair persistence on top of a [`SecretStore`].

use std::sync::Arc;
use tracing::{debug, instrument, warn};

use super::SecretStore;
use crate::auth::TokenPair;

/// Key holding the token pair as one JSON record.
pub const TOKEN_PAIR_KEY: &str = "tokenPair";

/// Legacy key for the access token (two-key layout).
pub const ACCESS_TOKEN_KEY: &str = "accessToken";

/// Legacy key for the refresh token (two-key layout).
pub const REFRESH_TOKEN_KEY: &str = "refreshToken";

/// Persists the session's token pair.
///
/// The pair is written as a single record so a crash can never leave an
/// access token without its refresh token. Pairs written by older builds
/// under two separate keys are still read and migrated on first load.
///
/// Storage failures never reach the caller: reads fail open to "no tokens"
/// and failed writes/deletes are logged.
#[derive(Clone)]
pub struct TokenStore {
    backend: Arc<dyn SecretStore>,
}

impl TokenStore {
    pub fn new(backend: Arc<dyn SecretStore>) -> Self {
        Self { backend }
    }

    /// Name of the underlying backend.
    pub fn backend_name(&self) -> &str {
        self.backend.name()
    }

    /// Load the stored pair, if a complete one exists.
    #[instrument(skip(self), fields(backend = self.backend.name()))]
    pub async fn load(&self) -> Option<TokenPair> {
        match self.backend.get(TOKEN_PAIR_KEY).await {
            Ok(Some(raw)) => match serde_json::from_str::<TokenPair>(&raw) {
                Ok(pair) => return Some(pair),
                Err(e) => {
                    warn!(error = %e, "Stored token record is unreadable, treating as signed out");
                    return None;
                }
            },
            Ok(None) => {}
            Err(e) => {
                warn!(error = %e, "Failed to read token record");
                return None;
            }
        }

        let pair = self.load_legacy().await?;
        debug!("Migrating two-key token layout to a single record");
        self.save(&pair).await;
        Some(pair)
    }

    /// Stored refresh token, if any.
    pub async fn refresh_token(&self) -> Option<String> {
        self.load().await.map(|pair| pair.refresh_token)
    }

    /// Replace the stored pair. Returns whether the write succeeded.
    #[instrument(skip(self, pair), fields(backend = self.backend.name()))]
    pub async fn save(&self, pair: &TokenPair) -> bool {
        let json = match serde_json::to_string(pair) {
            Ok(json) => json,
            Err(e) => {
                warn!(error = %e, "Failed to serialize token pair");
                return false;
            }
        };
        if let Err(e) = self.backend.set(TOKEN_PAIR_KEY, &json).await {
            warn!(error = %e, "Failed to persist token pair");
            return false;
        }
        // Drop leftovers from the two-key layout.
        self.delete_quietly(ACCESS_TOKEN_KEY).await;
        self.delete_quietly(REFRESH_TOKEN_KEY).await;
        true
    }

    /// Delete every stored credential.
    #[instrument(skip(self), fields(backend = self.backend.name()))]
    pub async fn clear(&self) {
        self.delete_quietly(TOKEN_PAIR_KEY).await;
        self.delete_quietly(ACCESS_TOKEN_KEY).await;
        self.delete_quietly(REFRESH_TOKEN_KEY).await;
    }

    async fn load_legacy(&self) -> Option<TokenPair> {
        let access = self.get_quietly(ACCESS_TOKEN_KEY).await;
        let refresh = self.get_quietly(REFRESH_TOKEN_KEY).await;
        match (access, refresh) {
            (Some(access), Some(refresh)) => Some(TokenPair::new(access, refresh)),
            (None, None) => None,
            _ => {
                warn!("Found only one of the legacy token keys, ignoring it");
                None
            }
        }
    }

    async fn get_quietly(&self, key: &str) -> Option<String> {
        match self.backend.get(key).await {
            Ok(value) => value.filter(|v| !v.is_empty()),
            Err(e) => {
                warn!(key, error = %e, "Failed to read secret");
                None
            }
        }
    }

    async fn delete_quietly(&self, key: &str) {
        if let Err(e) = self.backend.delete(key).await {
            warn!(key, error = %e, "Failed to delete secret");
        }
    }
}

impl std::fmt::Debug for TokenStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenStore")
            .field("backend", &self.backend.name())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{Error, Result};
    use crate::store::MemorySecretStore;
    use async_trait::async_trait;

    /// Backend whose every operation fails.
    struct BrokenStore;

    #[async_trait]
    impl SecretStore for BrokenStore {
        async fn get(&self, _key: &str) -> Result<Option<String>> {
            Err(Error::Storage("device locked".into()))
        }
        async fn set(&self, _key: &str, _value: &str) -> Result<()> {
            Err(Error::Storage("device locked".into()))
        }
        async fn delete(&self, _key: &str) -> Result<()> {
            Err(Error::Storage("device locked".into()))
        }
    }

    #[tokio::test]
    async fn test_save_then_load() {
        let backend = MemorySecretStore::new();
        let store = TokenStore::new(Arc::new(backend.clone()));
        assert!(store.load().await.is_none());

        assert!(store.save(&TokenPair::new("A1", "R1")).await);
        assert_eq!(store.load().await, Some(TokenPair::new("A1", "R1")));
        assert!(backend.contains(TOKEN_PAIR_KEY));
        assert_eq!(store.refresh_token().await.as_deref(), Some("R1"));
    }

    #[tokio::test]
    async fn test_legacy_layout_is_migrated() {
        let backend =
            MemorySecretStore::with_entries([(ACCESS_TOKEN_KEY, "A1"), (REFRESH_TOKEN_KEY, "R1")]);
        let store = TokenStore::new(Arc::new(backend.clone()));

        assert_eq!(store.load().await, Some(TokenPair::new("A1", "R1")));
        assert!(backend.contains(TOKEN_PAIR_KEY));
        assert!(!backend.contains(ACCESS_TOKEN_KEY));
        assert!(!backend.contains(REFRESH_TOKEN_KEY));
    }

    #[tokio::test]
    async fn test_lone_legacy_key_is_absent() {
        let backend = MemorySecretStore::with_entries([(ACCESS_TOKEN_KEY, "A1")]);
        let store = TokenStore::new(Arc::new(backend));
        assert!(store.load().await.is_none());
    }

    #[tokio::test]
    async fn test_corrupt_record_is_absent() {
        let backend = MemorySecretStore::with_entries([(TOKEN_PAIR_KEY, "{not json")]);
        let store = TokenStore::new(Arc::new(backend));
        assert!(store.load().await.is_none());
    }

    #[tokio::test]
    async fn test_clear_removes_everything() {
        let backend = MemorySecretStore::with_entries([(ACCESS_TOKEN_KEY, "old")]);
        let store = TokenStore::new(Arc::new(backend.clone()));
        store.save(&TokenPair::new("A1", "R1")).await;
        store.clear().await;
        assert!(backend.is_empty());
        assert!(store.load().await.is_none());
    }

    #[tokio::test]
    async fn test_broken_backend_fails_open() {
        let store = TokenStore::new(Arc::new(BrokenStore));
        assert!(store.load().await.is_none());
        assert!(!store.save(&TokenPair::new("A1", "R1")).await);
        store.clear().await;
    }
}
