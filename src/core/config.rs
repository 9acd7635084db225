//! Device configuration (`lexisync.toml`).
//!
//! Identity and retry tuning live here; everything else is derived from the
//! store root at runtime.

use crate::core::error::SyncError;
use crate::core::transport::RetryPolicy;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

pub const CONFIG_FILE_NAME: &str = "lexisync.toml";

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DeviceConfig {
    /// User id; doubles as the bearer token in the current auth scheme.
    pub user_id: String,
    #[serde(default)]
    pub display_name: String,
    #[serde(default)]
    pub retry: RetryConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RetryConfig {
    pub max_retries: u32,
    pub base_ms: u64,
    pub cap_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        let p = RetryPolicy::default();
        Self {
            max_retries: p.max_retries,
            base_ms: p.base_ms,
            cap_ms: p.cap_ms,
        }
    }
}

impl RetryConfig {
    pub fn policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_retries: self.max_retries,
            base_ms: self.base_ms,
            cap_ms: self.cap_ms,
        }
    }
}

/// Load config from `<root>/lexisync.toml`.
pub fn load_config(root: &Path) -> Result<DeviceConfig, SyncError> {
    let config_path = root.join(CONFIG_FILE_NAME);
    if !config_path.exists() {
        return Err(SyncError::ConfigError(format!(
            "missing {} (run `lexisync init` first)",
            config_path.display()
        )));
    }
    let content = fs::read_to_string(&config_path).map_err(SyncError::IoError)?;
    let config: DeviceConfig =
        toml::from_str(&content).map_err(|e| SyncError::ConfigError(e.to_string()))?;
    if config.user_id.trim().is_empty() {
        return Err(SyncError::ConfigError(
            "user_id must not be empty".to_string(),
        ));
    }
    Ok(config)
}

/// Write config to `<root>/lexisync.toml`, creating the root if needed.
pub fn write_config(root: &Path, config: &DeviceConfig) -> Result<(), SyncError> {
    fs::create_dir_all(root).map_err(SyncError::IoError)?;
    let content =
        toml::to_string_pretty(config).map_err(|e| SyncError::ConfigError(e.to_string()))?;
    fs::write(root.join(CONFIG_FILE_NAME), content).map_err(SyncError::IoError)?;
    Ok(())
}
