//! Cached, authenticated data fetching for UI screens.

use serde::de::DeserializeOwned;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tracing::{debug, instrument};

use super::manager::SessionManager;
use crate::error::{Error, Result};
use crate::net::ApiRequest;

#[derive(Debug, Default)]
struct CacheInner {
    entries: HashMap<String, serde_json::Value>,
    /// Bumped on every clear so in-flight fetches from an older session
    /// cannot repopulate the cache.
    epoch: u64,
}

/// JSON results keyed by request path.
///
/// Cloned handles share the same cache.
#[derive(Debug, Clone, Default)]
pub struct QueryCache {
    inner: Arc<Mutex<CacheInner>>,
}

impl QueryCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &str) -> Option<serde_json::Value> {
        self.inner.lock().expect("lock poisoned").entries.get(key).cloned()
    }

    pub fn len(&self) -> usize {
        self.inner.lock().expect("lock poisoned").entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drop one entry so the next fetch goes to the network.
    pub fn invalidate(&self, key: &str) {
        self.inner.lock().expect("lock poisoned").entries.remove(key);
    }

    /// Drop everything and start a new epoch.
    pub fn clear(&self) {
        let mut inner = self.inner.lock().expect("lock poisoned");
        inner.entries.clear();
        inner.epoch += 1;
    }

    fn epoch(&self) -> u64 {
        self.inner.lock().expect("lock poisoned").epoch
    }

    /// Store `value` unless the cache was cleared since `epoch` was read.
    fn insert_if_current(&self, epoch: u64, key: &str, value: serde_json::Value) -> bool {
        let mut inner = self.inner.lock().expect("lock poisoned");
        if inner.epoch != epoch {
            return false;
        }
        inner.entries.insert(key.to_string(), value);
        true
    }
}

/// Declarative fetch helper backed by [`SessionManager::authenticated_request`].
///
/// Queries are disabled while signed out. A 401 triggers at most one refresh
/// and one retry; if the refresh fails the session is signed out and the
/// fetch fails with [`Error::RefreshExhausted`].
#[derive(Clone)]
pub struct QueryClient {
    session: Arc<SessionManager>,
}

impl QueryClient {
    pub fn new(session: Arc<SessionManager>) -> Self {
        Self { session }
    }

    /// Fetch `path`, serving from cache when possible.
    #[instrument(skip(self))]
    pub async fn fetch<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        if self.session.access_token().is_none() {
            return Err(Error::NotAuthenticated);
        }

        let cache = self.session.query_cache();
        if let Some(hit) = cache.get(path) {
            debug!("Serving cached query");
            return Ok(serde_json::from_value(hit)?);
        }

        let epoch = cache.epoch();
        let value: serde_json::Value = self
            .session
            .authenticated_request(ApiRequest::get(path))
            .await?;
        cache.insert_if_current(epoch, path, value.clone());
        Ok(serde_json::from_value(value)?)
    }

    /// Fetch `path` from the network, replacing any cached value.
    pub async fn refetch<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        self.session.query_cache().invalidate(path);
        self.fetch(path).await
    }

    pub fn invalidate(&self, path: &str) {
        self.session.query_cache().invalidate(path);
    }
}
