//! User-wide pool configuration (`~/.docdeps/config.toml`).

use crate::config::get_cache_dir;
use crate::constants::CACHE_DIR_ENV;
use crate::core::DocdepsError;
use crate::utils::resolve_path;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::fs;

/// Pool settings read from the user's config file.
///
/// Every key is optional; absent keys take their defaults.
///
/// ```toml
/// storage_dir = "~/work/docdeps-cache"
/// lockdown_window_secs = 600
/// index_lock_timeout_secs = 30
/// restore_retry_timeout_secs = 120
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PoolConfig {
    /// Storage root; supports `~/` and `$VAR` expansion.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub storage_dir: Option<String>,

    /// Idle time after which a slot may be reclaimed by a restore.
    pub lockdown_window_secs: u64,

    /// How long to wait for another process's registry update.
    pub index_lock_timeout_secs: u64,

    /// How long `docdeps restore` retries while every slot is busy.
    pub restore_retry_timeout_secs: u64,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            storage_dir: None,
            lockdown_window_secs: crate::constants::DEFAULT_LOCKDOWN_WINDOW.as_secs(),
            index_lock_timeout_secs: crate::constants::DEFAULT_INDEX_LOCK_TIMEOUT.as_secs(),
            restore_retry_timeout_secs: crate::constants::DEFAULT_RESTORE_RETRY_TIMEOUT.as_secs(),
        }
    }
}

impl PoolConfig {
    /// Load from `path` if given, else from the default location.
    ///
    /// A missing file yields the defaults.
    pub async fn load_with_optional(path: Option<PathBuf>) -> Result<Self> {
        let path = match path {
            Some(path) => path,
            None => Self::default_path()?,
        };
        if path.exists() {
            Self::load_from(&path).await
        } else {
            tracing::debug!("No config at {}, using defaults", path.display());
            Ok(Self::default())
        }
    }

    /// Load from a specific file.
    ///
    /// # Errors
    ///
    /// Fails if the file cannot be read or is not valid config TOML.
    pub async fn load_from(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read config from {}", path.display()))?;

        let config: Self = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config from {}", path.display()))?;
        config.validate()?;
        Ok(config)
    }

    /// `~/.docdeps/config.toml`, or `%LOCALAPPDATA%\docdeps\config.toml` on Windows.
    pub fn default_path() -> Result<PathBuf> {
        let config_dir = if cfg!(target_os = "windows") {
            dirs::data_local_dir()
                .ok_or_else(|| anyhow::anyhow!("Unable to determine local data directory"))?
                .join("docdeps")
        } else {
            dirs::home_dir()
                .ok_or_else(|| anyhow::anyhow!("Unable to determine home directory"))?
                .join(".docdeps")
        };

        Ok(config_dir.join("config.toml"))
    }

    /// Storage root of the slot pool.
    ///
    /// `DOCDEPS_CACHE_DIR` wins over `storage_dir`, which wins over the
    /// platform default.
    pub fn storage_root(&self) -> Result<PathBuf> {
        if std::env::var_os(CACHE_DIR_ENV).is_some() {
            return get_cache_dir();
        }
        match &self.storage_dir {
            Some(dir) => resolve_path(dir),
            None => get_cache_dir(),
        }
    }

    #[must_use]
    pub const fn lockdown_window(&self) -> Duration {
        Duration::from_secs(self.lockdown_window_secs)
    }

    #[must_use]
    pub const fn index_lock_timeout(&self) -> Duration {
        Duration::from_secs(self.index_lock_timeout_secs)
    }

    #[must_use]
    pub const fn restore_retry_timeout(&self) -> Duration {
        Duration::from_secs(self.restore_retry_timeout_secs)
    }

    fn validate(&self) -> Result<()> {
        if self.storage_dir.as_deref().is_some_and(|dir| dir.trim().is_empty()) {
            return Err(DocdepsError::ConfigError {
                message: "storage_dir must not be empty".to_string(),
            }
            .into());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use tempfile::TempDir;

    #[test]
    fn test_defaults() {
        let config = PoolConfig::default();
        assert_eq!(config.lockdown_window(), Duration::from_secs(600));
        assert_eq!(config.index_lock_timeout(), Duration::from_secs(30));
        assert_eq!(config.restore_retry_timeout(), Duration::from_secs(120));
        assert!(config.storage_dir.is_none());
    }

    #[tokio::test]
    async fn test_load_partial_file() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("config.toml");
        std::fs::write(&path, "lockdown_window_secs = 5\nstorage_dir = \"/srv/docdeps\"\n")
            .unwrap();

        let config = PoolConfig::load_from(&path).await.unwrap();
        assert_eq!(config.lockdown_window(), Duration::from_secs(5));
        assert_eq!(config.index_lock_timeout(), Duration::from_secs(30));
        assert_eq!(config.storage_dir.as_deref(), Some("/srv/docdeps"));
    }

    #[tokio::test]
    async fn test_missing_file_gives_defaults() {
        let temp = TempDir::new().unwrap();
        let config =
            PoolConfig::load_with_optional(Some(temp.path().join("absent.toml"))).await.unwrap();
        assert_eq!(config, PoolConfig::default());
    }

    #[tokio::test]
    async fn test_invalid_file_is_an_error() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("config.toml");

        std::fs::write(&path, "lockdown_window_secs = \"soon\"").unwrap();
        let err = PoolConfig::load_from(&path).await.unwrap_err();
        assert!(err.downcast_ref::<toml::de::Error>().is_some());

        std::fs::write(&path, "unknown_key = 1").unwrap();
        assert!(PoolConfig::load_from(&path).await.is_err());

        std::fs::write(&path, "storage_dir = \"  \"").unwrap();
        let err = PoolConfig::load_from(&path).await.unwrap_err();
        assert!(matches!(
            err.downcast_ref::<DocdepsError>(),
            Some(DocdepsError::ConfigError { .. })
        ));
    }

    #[test]
    #[serial]
    fn test_storage_root_precedence() {
        let config = PoolConfig {
            storage_dir: Some("/srv/docdeps".to_string()),
            ..PoolConfig::default()
        };

        // SAFETY: serialized with the other tests touching this variable
        unsafe { std::env::remove_var(CACHE_DIR_ENV) };
        assert_eq!(config.storage_root().unwrap(), PathBuf::from("/srv/docdeps"));

        unsafe { std::env::set_var(CACHE_DIR_ENV, "/tmp/override") };
        assert_eq!(config.storage_root().unwrap(), PathBuf::from("/tmp/override"));
        unsafe { std::env::remove_var(CACHE_DIR_ENV) };
    }
}
