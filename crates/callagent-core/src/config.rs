//! CallAgent configuration system.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{CallAgentError, Result};
use crate::payload::{DEFAULT_DATE_FORMAT, format_date};

/// Root configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CallAgentConfig {
    #[serde(default)]
    pub gateway: GatewayConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub scheduler: SchedulerConfig,
    #[serde(default)]
    pub delivery: DeliveryConfig,
}

impl CallAgentConfig {
    /// Load config from the default path (~/.callagent/config.toml).
    pub fn load() -> Result<Self> {
        let path = Self::default_path();
        if path.exists() {
            Self::load_from(&path)
        } else {
            Ok(Self::default())
        }
    }

    /// Load config from a specific path.
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| CallAgentError::Config(format!("Failed to read config: {e}")))?;
        let config: Self = toml::from_str(&content)
            .map_err(|e| CallAgentError::Config(format!("Failed to parse config: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    /// Reject values that would only fail later, at send time.
    pub fn validate(&self) -> Result<()> {
        self.delivery.validate()
    }

    /// Save config to `path`, creating parent directories.
    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)
            .map_err(|e| CallAgentError::Config(format!("Failed to serialize config: {e}")))?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Get the default config path.
    pub fn default_path() -> PathBuf {
        Self::home_dir().join("config.toml")
    }

    /// Get the CallAgent home directory.
    pub fn home_dir() -> PathBuf {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".callagent")
    }
}

/// HTTP API configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_host")]
    pub host: String,
}

fn default_port() -> u16 { 3000 }
fn default_host() -> String { "127.0.0.1".into() }

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
            host: default_host(),
        }
    }
}

/// Which key-value backend holds reports and settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    /// One JSON file per key.
    Json,
    /// Single SQLite table.
    Sqlite,
    /// Process memory only; lost on exit.
    Memory,
}

/// Storage configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    #[serde(default = "default_backend")]
    pub backend: StorageBackend,
    #[serde(default = "default_data_dir")]
    pub data_dir: String,
}

fn default_backend() -> StorageBackend { StorageBackend::Json }
fn default_data_dir() -> String { "~/.callagent/data".into() }

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: default_backend(),
            data_dir: default_data_dir(),
        }
    }
}

impl StorageConfig {
    /// Data directory with `~` expanded.
    pub fn data_path(&self) -> PathBuf {
        PathBuf::from(shellexpand::tilde(&self.data_dir).to_string())
    }
}

/// Automatic daily summary configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerConfig {
    #[serde(default = "bool_true")]
    pub enabled: bool,
    /// Send a missed summary later the same day instead of skipping it.
    #[serde(default)]
    pub catch_up: bool,
}

fn bool_true() -> bool { true }

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            catch_up: false,
        }
    }
}

/// Outbound webhook configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeliveryConfig {
    /// Per-request timeout. Unset means requests may hang indefinitely.
    #[serde(default)]
    pub request_timeout_secs: Option<u64>,
    /// `chrono` format of the `date` field in summaries.
    #[serde(default = "default_date_format")]
    pub date_format: String,
}

fn default_date_format() -> String { DEFAULT_DATE_FORMAT.into() }

impl DeliveryConfig {
    pub fn validate(&self) -> Result<()> {
        let sample = chrono::NaiveDate::default();
        format_date(sample, &self.date_format).map(|_| ())
    }
}

impl Default for DeliveryConfig {
    fn default() -> Self {
        Self {
            request_timeout_secs: None,
            date_format: default_date_format(),
        }
    }
}
