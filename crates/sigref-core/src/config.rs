//! Application configuration management.
//!
//! This module handles loading and saving the application configuration:
//! the API base URL, the last used username, the master data sync interval,
//! the request timeout and whether the local cache is encrypted.
//!
//! Configuration is stored at `~/.config/sigref/config.json`. The
//! `SIGREF_API_URL` and `SIGREF_USERNAME` environment variables override
//! the stored values for a single run.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::Result;
use serde::{Deserialize, Serialize};

use crate::api::client::{DEFAULT_API_BASE_URL, REQUEST_TIMEOUT_SECS};

/// Application name used for config/cache directory paths
const APP_NAME: &str = "sigref";

/// Config file name
const CONFIG_FILE: &str = "config.json";

/// Master data is considered due for refresh after a day
const DEFAULT_SYNC_INTERVAL_HOURS: i64 = 24;

pub const ENV_API_URL: &str = "SIGREF_API_URL";
pub const ENV_USERNAME: &str = "SIGREF_USERNAME";
pub const ENV_PASSWORD: &str = "SIGREF_PASSWORD";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub api_base_url: String,
    pub last_username: Option<String>,
    pub sync_interval_hours: i64,
    pub request_timeout_secs: u64,
    /// Seal cached values with a key kept in the OS keychain
    pub encrypt_cache: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_base_url: DEFAULT_API_BASE_URL.to_string(),
            last_username: None,
            sync_interval_hours: DEFAULT_SYNC_INTERVAL_HOURS,
            request_timeout_secs: REQUEST_TIMEOUT_SECS,
            encrypt_cache: true,
        }
    }
}

impl Config {
    /// Load the stored config and apply environment overrides
    pub fn load() -> Result<Self> {
        let path = Self::config_path()?;
        let mut config = if path.exists() {
            let contents = std::fs::read_to_string(&path)?;
            serde_json::from_str(&contents)?
        } else {
            Self::default()
        };
        config.apply_env(|key| std::env::var(key).ok());
        Ok(config)
    }

    pub fn save(&self) -> Result<()> {
        let path = Self::config_path()?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let contents = serde_json::to_string_pretty(self)?;
        std::fs::write(path, contents)?;
        Ok(())
    }

    fn apply_env(&mut self, var: impl Fn(&str) -> Option<String>) {
        if let Some(url) = var(ENV_API_URL).filter(|v| !v.trim().is_empty()) {
            self.api_base_url = url.trim().trim_end_matches('/').to_string();
        }
        if let Some(username) = var(ENV_USERNAME).filter(|v| !v.trim().is_empty()) {
            self.last_username = Some(username);
        }
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

    pub fn sync_interval(&self) -> chrono::Duration {
        chrono::Duration::hours(self.sync_interval_hours.max(0))
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs.max(1))
    }
}
