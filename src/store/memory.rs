//! In-memory secret storage.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use tracing::instrument;

use super::SecretStore;
use crate::error::Result;

/// In-memory secret storage.
///
/// Uses `Arc<RwLock<HashMap>>` for thread-safe access. Clones share the same
/// map, so a test can keep a handle and inspect what the session wrote.
#[derive(Debug, Clone, Default)]
pub struct MemorySecretStore {
    inner: Arc<RwLock<HashMap<String, String>>>,
}

impl MemorySecretStore {
    /// Create a new empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store pre-populated with `entries`.
    pub fn with_entries<K, V>(entries: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        let map = entries
            .into_iter()
            .map(|(k, v)| (k.into(), v.into()))
            .collect();
        Self {
            inner: Arc::new(RwLock::new(map)),
        }
    }

    /// Whether `key` is present.
    pub fn contains(&self, key: &str) -> bool {
        self.inner.read().expect("lock poisoned").contains_key(key)
    }

    /// Number of stored keys.
    pub fn len(&self) -> usize {
        self.inner.read().expect("lock poisoned").len()
    }

    /// Check if storage is empty.
    pub fn is_empty(&self) -> bool {
        self.inner.read().expect("lock poisoned").is_empty()
    }
}

#[async_trait]
impl SecretStore for MemorySecretStore {
    #[instrument(skip(self))]
    async fn get(&self, key: &str) -> Result<Option<String>> {
        let guard = self.inner.read().expect("lock poisoned");
        Ok(guard.get(key).cloned())
    }

    #[instrument(skip(self, value))]
    async fn set(&self, key: &str, value: &str) -> Result<()> {
        let mut guard = self.inner.write().expect("lock poisoned");
        guard.insert(key.to_string(), value.to_string());
        Ok(())
    }

    #[instrument(skip(self))]
    async fn delete(&self, key: &str) -> Result<()> {
        let mut guard = self.inner.write().expect("lock poisoned");
        guard.remove(key);
        Ok(())
    }

    fn name(&self) -> &str {
        "memory"
    }
}
