//! # Configuration Management Module
//!
//! TOML configuration for the CLI harness and anything else that wires up the
//! core. Every section has defaults, so a partial file (or none at all, via
//! [`Config::default`]) is enough to run.
//!
//! ## Configuration Structure
//!
//! - [`StorageConfig`] - where the key-value store keeps its files
//! - [`CatalogConfig`] - remote catalog endpoint and request timeout
//! - [`UnlockConfig`] - cooldown length, reveal delay, image timeout, poll interval
//! - [`NotificationConfig`] - whether "gift ready" notifications are permitted
//! - [`LoggingConfig`] - log level and optional log file
//!
//! ## Configuration File Format
//!
//! ```toml
//! [storage]
//! data_dir = "./data"
//!
//! [catalog]
//! url = "https://amiiboapi.com/api/amiibo/?page=1&type=figure"
//! timeout_seconds = 10
//!
//! [unlock]
//! cooldown_minutes = 120
//! reveal_delay_ms = 800
//! ```

use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio::fs;

use crate::unlock::{COOLDOWN_DURATION, REVEAL_DELAY};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub catalog: CatalogConfig,
    #[serde(default)]
    pub unlock: UnlockConfig,
    #[serde(default)]
    pub notifications: NotificationConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub data_dir: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            data_dir: "./data".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CatalogConfig {
    /// Catalog endpoint; one GET, first page only
    pub url: String,
    /// Request timeout in seconds
    pub timeout_seconds: u32,
}

impl Default for CatalogConfig {
    fn default() -> Self {
        Self {
            url: "https://amiiboapi.com/api/amiibo/?page=1&type=figure".to_string(),
            timeout_seconds: 10,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UnlockConfig {
    /// Minutes between successful unlocks
    #[serde(default = "default_cooldown_minutes")]
    pub cooldown_minutes: u64,
    /// Minimum reveal delay in milliseconds (joined with the image preload)
    #[serde(default = "default_reveal_delay_ms")]
    pub reveal_delay_ms: u64,
    /// Upper bound on waiting for an image preload
    #[serde(default = "default_image_timeout_seconds")]
    pub image_timeout_seconds: u64,
    /// Cooldown watcher tick interval in milliseconds
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
}

fn default_cooldown_minutes() -> u64 {
    COOLDOWN_DURATION.as_secs() / 60
}

fn default_reveal_delay_ms() -> u64 {
    REVEAL_DELAY.as_millis() as u64
}

fn default_image_timeout_seconds() -> u64 {
    10
}

fn default_poll_interval_ms() -> u64 {
    1000
}

impl Default for UnlockConfig {
    fn default() -> Self {
        Self {
            cooldown_minutes: default_cooldown_minutes(),
            reveal_delay_ms: default_reveal_delay_ms(),
            image_timeout_seconds: default_image_timeout_seconds(),
            poll_interval_ms: default_poll_interval_ms(),
        }
    }
}

impl UnlockConfig {
    pub fn cooldown(&self) -> Duration {
        Duration::from_secs(self.cooldown_minutes.saturating_mul(60))
    }

    pub fn reveal_delay(&self) -> Duration {
        Duration::from_millis(self.reveal_delay_ms)
    }

    pub fn image_timeout(&self) -> Duration {
        Duration::from_secs(self.image_timeout_seconds)
    }

    pub fn poll_interval(&self) -> Duration {
        // Zero would spin the watcher
        Duration::from_millis(self.poll_interval_ms.max(50))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NotificationConfig {
    /// Stand-in for the platform "permission granted" check
    pub enabled: bool,
}

impl Default for NotificationConfig {
    fn default() -> Self {
        Self { enabled: true }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    pub file: Option<String>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            file: None,
        }
    }
}

impl Config {
    /// Load configuration from a file
    pub async fn load(path: &str) -> Result<Self> {
        let content = fs::read_to_string(path)
            .await
            .map_err(|e| anyhow!("Failed to read config file {}: {}", path, e))?;

        let config: Config = toml::from_str(&content)
            .map_err(|e| anyhow!("Failed to parse config file {}: {}", path, e))?;

        Ok(config)
    }

    /// Create a default configuration file
    pub async fn create_default(path: &str) -> Result<()> {
        let config = Config::default();
        let content = toml::to_string_pretty(&config)
            .map_err(|e| anyhow!("Failed to serialize default config: {}", e))?;

        fs::write(path, content)
            .await
            .map_err(|e| anyhow!("Failed to write config file {}: {}", path, e))?;

        Ok(())
    }
}
