//! Application configuration management.
//!
//! This module handles loading and saving the application configuration,
//! which includes the API base URL, the last used username and where the
//! session token is kept.
//!
//! Configuration is stored at `~/.config/taskdo/config.json`.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::api::client::{DEFAULT_BASE_URL, REQUEST_TIMEOUT_SECS};
use crate::api::ApiClient;
use crate::auth::{FileTokenStore, KeyringTokenStore, TokenStore};

/// Application name used for config/cache directory paths
const APP_NAME: &str = "taskdo";

/// Config file name
const CONFIG_FILE: &str = "config.json";

/// Where the session token is persisted
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenBackend {
    /// `token.json` in the cache directory
    #[default]
    File,
    /// OS keychain
    Keyring,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub base_url: Option<String>,
    pub last_username: Option<String>,
    pub token_backend: TokenBackend,
    pub request_timeout_secs: Option<u64>,
    pub log_to_file: bool,
}

impl Config {
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::config_path()?)
    }

    /// Load from an explicit path. A missing file yields the defaults.
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        serde_json::from_str(&contents)
            .with_context(|| format!("Failed to parse config file {}", path.display()))
    }

    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::config_path()?)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let contents = serde_json::to_string_pretty(self)?;
        std::fs::write(path, contents)?;
        Ok(())
    }

    fn config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find config directory"))?;
        Ok(config_dir.join(APP_NAME).join(CONFIG_FILE))
    }

    pub fn cache_dir(&self) -> Result<PathBuf> {
        let cache_dir = dirs::cache_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find cache directory"))?;
        Ok(cache_dir.join(APP_NAME))
    }

    pub fn base_url(&self) -> &str {
        self.base_url
            .as_deref()
            .filter(|url| !url.trim().is_empty())
            .unwrap_or(DEFAULT_BASE_URL)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs.unwrap_or(REQUEST_TIMEOUT_SECS))
    }

    pub fn api_client(&self) -> Result<ApiClient> {
        ApiClient::with_timeout(self.base_url(), self.request_timeout())
            .context("Failed to build HTTP client")
    }

    pub fn token_store(&self) -> Result<Box<dyn TokenStore>> {
        Ok(match self.token_backend {
            TokenBackend::File => Box::new(FileTokenStore::new(self.cache_dir()?)),
            TokenBackend::Keyring => Box::new(KeyringTokenStore::new()),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_file_gives_defaults() {
        let dir = tempfile::tempdir().expect("tempdir");
        let config = Config::load_from(&dir.path().join("config.json")).expect("load");
        assert_eq!(config.base_url(), DEFAULT_BASE_URL);
        assert_eq!(config.token_backend, TokenBackend::File);
        assert_eq!(config.request_timeout(), Duration::from_secs(30));
        assert!(!config.log_to_file);
    }

    #[test]
    fn test_partial_file_fills_defaults() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("config.json");
        std::fs::write(&path, r#"{"token_backend":"keyring","request_timeout_secs":5}"#)
            .expect("write");

        let config = Config::load_from(&path).expect("load");
        assert_eq!(config.token_backend, TokenBackend::Keyring);
        assert_eq!(config.request_timeout(), Duration::from_secs(5));
        assert!(config.last_username.is_none());
    }

    #[test]
    fn test_save_creates_parent_dirs() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("taskdo").join("config.json");
        let config = Config {
            base_url: Some("http://localhost:8000".to_string()),
            last_username: Some("jdoe".to_string()),
            ..Config::default()
        };
        config.save_to(&path).expect("save");

        let loaded = Config::load_from(&path).expect("load");
        assert_eq!(loaded.base_url(), "http://localhost:8000");
        assert_eq!(loaded.last_username.as_deref(), Some("jdoe"));
    }

    #[test]
    fn test_blank_base_url_falls_back() {
        let config = Config {
            base_url: Some("  ".to_string()),
            ..Config::default()
        };
        assert_eq!(config.base_url(), DEFAULT_BASE_URL);
    }

    #[test]
    fn test_corrupt_file_is_an_error() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("config.json");
        std::fs::write(&path, "not json").expect("write");
        assert!(Config::load_from(&path).is_err());
    }
}
