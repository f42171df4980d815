//! # Configuration Management Module
//!
//! TOML-backed configuration for the StudyQuest service, with validation
//! and sensible defaults. The reward rules themselves (rates, caps, the
//! level curve) are fixed engine rules and deliberately not configurable;
//! configuration covers deployment concerns only.
//!
//! ## Configuration File Format
//!
//! ```toml
//! [storage]
//! data_dir = "./data"
//!
//! [limits]
//! reward_history = 20
//! leaderboard = 10
//!
//! [logging]
//! level = "info"
//! ```

use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};
use tokio::fs;

/// Main configuration structure.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub limits: LimitsConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Directory holding the sled database.
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
pub struct LimitsConfig {
    /// Default number of ledger entries returned by reward history reads.
    pub reward_history: usize,
    /// Default number of rows returned by leaderboard reads.
    pub leaderboard: usize,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            reward_history: 20,
            leaderboard: 10,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level when not overridden by `-v` flags: error, warn, info,
    /// debug, or trace.
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

impl Config {
    /// Load and validate configuration from a TOML file.
    pub async fn load(path: &str) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .await
            .map_err(|e| anyhow!("cannot read config file {}: {}", path, e))?;
        let config: Config =
            toml::from_str(&contents).map_err(|e| anyhow!("invalid config {}: {}", path, e))?;
        config.validate()?;
        Ok(config)
    }

    /// Write a default configuration file, refusing to clobber an
    /// existing one.
    pub async fn create_default(path: &str) -> Result<()> {
        if fs::try_exists(path).await? {
            return Err(anyhow!("config file {} already exists", path));
        }
        let contents = toml::to_string_pretty(&Config::default())?;
        fs::write(path, contents).await?;
        Ok(())
    }

    fn validate(&self) -> Result<()> {
        if self.storage.data_dir.trim().is_empty() {
            return Err(anyhow!("storage.data_dir must not be empty"));
        }
        if self.limits.reward_history == 0 || self.limits.leaderboard == 0 {
            return Err(anyhow!("limits must be positive"));
        }
        match self.logging.level.as_str() {
            "error" | "warn" | "info" | "debug" | "trace" => Ok(()),
            other => Err(anyhow!("unknown logging.level: {}", other)),
        }
    }
}
