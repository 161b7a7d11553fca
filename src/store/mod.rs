//! Secure on-device storage for session secrets.
//!
//! Provides the [`SecretStore`] key-value contract and its backends:
//! - [`FileSecretStore`] - one file per key with 0600 permissions
//! - [`MemorySecretStore`] - in-memory (testing, ephemeral sessions)
//! - [`KeyringSecretStore`] - OS keyring (feature `system-keyring`)
//!
//! [`TokenStore`] layers the token-pair persistence rules on top.

mod file;
mod keyring;
mod memory;
mod tokens;

use async_trait::async_trait;
use std::sync::Arc;

pub use file::FileSecretStore;
#[cfg(feature = "system-keyring")]
pub use keyring::KeyringSecretStore;
pub use memory::MemorySecretStore;
pub use tokens::{ACCESS_TOKEN_KEY, REFRESH_TOKEN_KEY, TOKEN_PAIR_KEY, TokenStore};

use crate::config::{StorageBackend, StorageConfig};
use crate::error::Result;

/// Key-value contract for secure storage backends.
///
/// Writes must be all-or-nothing per key: a reader sees either the old value
/// or the new one, never a partial write.
#[async_trait]
pub trait SecretStore: Send + Sync {
    /// Read the value stored under `key`.
    async fn get(&self, key: &str) -> Result<Option<String>>;

    /// Store `value` under `key`, replacing any previous value.
    async fn set(&self, key: &str, value: &str) -> Result<()>;

    /// Delete `key`. Deleting a missing key is not an error.
    async fn delete(&self, key: &str) -> Result<()>;

    /// Name of this storage backend.
    fn name(&self) -> &str {
        "unknown"
    }
}

/// Blanket impl for `Arc<T>`.
#[async_trait]
impl<T: SecretStore + ?Sized> SecretStore for Arc<T> {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        (**self).get(key).await
    }
    async fn set(&self, key: &str, value: &str) -> Result<()> {
        (**self).set(key, value).await
    }
    async fn delete(&self, key: &str) -> Result<()> {
        (**self).delete(key).await
    }
    fn name(&self) -> &str {
        (**self).name()
    }
}

/// Blanket impl for `Box<T>`.
#[async_trait]
impl<T: SecretStore + ?Sized> SecretStore for Box<T> {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        (**self).get(key).await
    }
    async fn set(&self, key: &str, value: &str) -> Result<()> {
        (**self).set(key, value).await
    }
    async fn delete(&self, key: &str) -> Result<()> {
        (**self).delete(key).await
    }
    fn name(&self) -> &str {
        (**self).name()
    }
}

/// Build the backend selected in configuration.
pub fn from_config(config: &StorageConfig) -> Arc<dyn SecretStore> {
    match config.backend {
        StorageBackend::File => Arc::new(FileSecretStore::new(&config.dir)),
        #[cfg(feature = "system-keyring")]
        StorageBackend::Keyring => Arc::new(KeyringSecretStore::new()),
        #[cfg(not(feature = "system-keyring"))]
        StorageBackend::Keyring => {
            tracing::warn!(
                "Keyring storage requested but system-keyring feature not enabled, falling back to file storage"
            );
            Arc::new(FileSecretStore::new(&config.dir))
        }
        StorageBackend::Memory => Arc::new(MemorySecretStore::new()),
    }
}
