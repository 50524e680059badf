//! Application configuration management.
//!
//! This module handles loading and saving the application configuration,
//! which includes the last used username, the token storage backend and an
//! optional API base URL override.
//!
//! Configuration is stored at `~/.config/holocron/config.json`. The
//! `HOLOCRON_API_URL` and `HOLOCRON_TOKEN_BACKEND` environment variables
//! take precedence over the file.

use std::path::PathBuf;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::api::DEFAULT_API_BASE_URL;
use crate::auth::TokenBackend;

/// Application name used for config/cache directory paths
pub const APP_NAME: &str = "holocron";

/// Config file name
const CONFIG_FILE: &str = "config.json";

/// Environment override for the API base URL
pub const API_URL_ENV: &str = "HOLOCRON_API_URL";

/// Environment override for the token backend
pub const TOKEN_BACKEND_ENV: &str = "HOLOCRON_TOKEN_BACKEND";

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, Eq)]
pub struct Config {
    pub last_username: Option<String>,
    #[serde(default)]
    pub token_backend: TokenBackend,
    pub api_base_url: Option<String>,
}

impl Config {
    pub fn load() -> Result<Self> {
        let path = Self::config_path()?;
        let mut config = if path.exists() {
            let contents = std::fs::read_to_string(&path).context("Failed to read config file")?;
            serde_json::from_str(&contents).context("Failed to parse config file")?
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

    /// Layer environment overrides on top of the file values
    fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(url) = lookup(API_URL_ENV).filter(|u| !u.trim().is_empty()) {
            self.api_base_url = Some(url);
        }
        if let Some(value) = lookup(TOKEN_BACKEND_ENV) {
            match TokenBackend::parse(&value) {
                Some(backend) => self.token_backend = backend,
                None => warn!(value = %value, "Unknown token backend, keeping configured one"),
            }
        }
    }

    pub fn api_base_url(&self) -> &str {
        self.api_base_url.as_deref().unwrap_or(DEFAULT_API_BASE_URL)
    }

    fn config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find config directory"))?;
        Ok(config_dir.join(APP_NAME).join(CONFIG_FILE))
    }

    /// Cache directory for the token slot and logs. `None` when the
    /// platform has no cache location.
    pub fn cache_dir() -> Option<PathBuf> {
        dirs::cache_dir().map(|dir| dir.join(APP_NAME))
    }
}
