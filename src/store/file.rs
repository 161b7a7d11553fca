//! File-based secret storage.

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tracing::instrument;

use super::SecretStore;
use crate::error::{Error, Result};

/// File permissions for secret files (Unix only): owner read/write.
#[cfg(unix)]
const FILE_MODE: u32 = 0o600;

/// Directory permissions (Unix only): owner read/write/execute.
#[cfg(unix)]
const DIR_MODE: u32 = 0o700;

/// File-based secret storage.
///
/// Stores each key as its own file in a configurable directory:
/// `{dir}/{key}.secret`.
///
/// # Security
/// - File permissions are set to 0600 (owner read/write only) on Unix
/// - The directory is created with 0700 permissions
/// - Writes go to a temp file that is renamed over the target
#[derive(Debug, Clone)]
pub struct FileSecretStore {
    dir: PathBuf,
}

impl FileSecretStore {
    /// Create a store rooted at `dir`. The directory is created lazily.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Get the directory where secrets are stored.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn key_path(&self, key: &str) -> Result<PathBuf> {
        if key.is_empty() {
            return Err(Error::Storage("Key cannot be empty".to_string()));
        }
        if key.contains('/') || key.contains('\\') || key.contains("..") {
            return Err(Error::Storage(format!(
                "Invalid key '{key}': potential path traversal"
            )));
        }
        if !key.chars().all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_') {
            return Err(Error::Storage(format!(
                "Invalid key '{key}': contains invalid characters"
            )));
        }
        Ok(self.dir.join(format!("{key}.secret")))
    }

    async fn ensure_dir(&self) -> Result<()> {
        if tokio::fs::try_exists(&self.dir).await.unwrap_or(false) {
            return Ok(());
        }
        tokio::fs::create_dir_all(&self.dir).await.map_err(|e| {
            Error::Storage(format!(
                "Failed to create storage directory '{}': {e}",
                self.dir.display()
            ))
        })?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let perms = std::fs::Permissions::from_mode(DIR_MODE);
            tokio::fs::set_permissions(&self.dir, perms).await.map_err(|e| {
                Error::Storage(format!(
                    "Failed to set directory permissions on '{}': {e}",
                    self.dir.display()
                ))
            })?;
        }
        Ok(())
    }
}

#[async_trait]
impl SecretStore for FileSecretStore {
    #[instrument(skip(self))]
    async fn get(&self, key: &str) -> Result<Option<String>> {
        let path = self.key_path(key)?;
        match tokio::fs::read_to_string(&path).await {
            Ok(content) if content.is_empty() => Ok(None),
            Ok(content) => Ok(Some(content)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(Error::Storage(format!(
                "Failed to read '{}': {e}",
                path.display()
            ))),
        }
    }

    #[instrument(skip(self, value))]
    async fn set(&self, key: &str, value: &str) -> Result<()> {
        use tokio::io::AsyncWriteExt;

        self.ensure_dir().await?;
        let path = self.key_path(key)?;
        let temp_path = path.with_extension("tmp");

        let mut options = tokio::fs::OpenOptions::new();
        options.write(true).create(true).truncate(true);
        #[cfg(unix)]
        options.mode(FILE_MODE);

        let write = async {
            let mut file = options.open(&temp_path).await?;
            file.write_all(value.as_bytes()).await?;
            file.sync_all().await
        };
        if let Err(e) = write.await {
            let _ = tokio::fs::remove_file(&temp_path).await;
            return Err(Error::Storage(format!(
                "Failed to write temp file '{}': {e}",
                temp_path.display()
            )));
        }

        if let Err(e) = tokio::fs::rename(&temp_path, &path).await {
            let _ = tokio::fs::remove_file(&temp_path).await;
            return Err(Error::Storage(format!(
                "Failed to rename '{}' to '{}': {e}",
                temp_path.display(),
                path.display()
            )));
        }
        Ok(())
    }

    #[instrument(skip(self))]
    async fn delete(&self, key: &str) -> Result<()> {
        let path = self.key_path(key)?;
        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(Error::Storage(format!(
                "Failed to remove '{}': {e}",
                path.display()
            ))),
        }
    }

    fn name(&self) -> &str {
        "file"
    }
}
