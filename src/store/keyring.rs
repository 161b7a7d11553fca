//! Keyring-based secret storage.

#[cfg(feature = "system-keyring")]
use async_trait::async_trait;
#[cfg(feature = "system-keyring")]
use tracing::instrument;

#[cfg(feature = "system-keyring")]
use super::SecretStore;
#[cfg(feature = "system-keyring")]
use crate::error::{Error, Result};

/// Keyring-based secret storage.
///
/// Uses the platform credential store (Keychain, Secret Service, Credential
/// Manager). Each key becomes one entry under the service name.
///
/// Feature-gated behind `system-keyring`.
#[cfg(feature = "system-keyring")]
#[derive(Debug, Clone)]
pub struct KeyringSecretStore {
    /// Service name for keyring entries.
    service: String,
}

#[cfg(feature = "system-keyring")]
impl Default for KeyringSecretStore {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(feature = "system-keyring")]
impl KeyringSecretStore {
    /// Service name for keyring entries.
    const SERVICE_NAME: &str = "heartline-session";

    /// Create a store with the default service name.
    pub fn new() -> Self {
        Self {
            service: Self::SERVICE_NAME.to_string(),
        }
    }

    /// Create a store with a custom service name.
    pub fn with_service(service: impl Into<String>) -> Self {
        Self {
            service: service.into(),
        }
    }

    fn entry(&self, key: &str) -> Result<keyring::Entry> {
        keyring::Entry::new(&self.service, key)
            .map_err(|e| Error::Storage(format!("Failed to create keyring entry: {e}")))
    }
}

// Keyring calls block on platform IPC, so they run on the blocking pool.
#[cfg(feature = "system-keyring")]
#[async_trait]
impl SecretStore for KeyringSecretStore {
    #[instrument(skip(self))]
    async fn get(&self, key: &str) -> Result<Option<String>> {
        let entry = self.entry(key)?;
        let read = tokio::task::spawn_blocking(move || entry.get_password())
            .await
            .map_err(|e| Error::Storage(format!("Keyring task failed: {e}")))?;
        match read {
            Ok(value) => Ok(Some(value)),
            Err(keyring::Error::NoEntry) => Ok(None),
            Err(e) => Err(Error::Storage(format!("Keyring error: {e}"))),
        }
    }

    #[instrument(skip(self, value))]
    async fn set(&self, key: &str, value: &str) -> Result<()> {
        let entry = self.entry(key)?;
        let value = value.to_string();
        tokio::task::spawn_blocking(move || entry.set_password(&value))
            .await
            .map_err(|e| Error::Storage(format!("Keyring task failed: {e}")))?
            .map_err(|e| Error::Storage(format!("Keyring error: {e}")))
    }

    #[instrument(skip(self))]
    async fn delete(&self, key: &str) -> Result<()> {
        let entry = self.entry(key)?;
        let removed = tokio::task::spawn_blocking(move || entry.delete_credential())
            .await
            .map_err(|e| Error::Storage(format!("Keyring task failed: {e}")))?;
        match removed {
            Ok(()) | Err(keyring::Error::NoEntry) => Ok(()),
            Err(e) => Err(Error::Storage(format!("Keyring error: {e}"))),
        }
    }

    fn name(&self) -> &str {
        "keyring"
    }
}
