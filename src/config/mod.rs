use crate::global;
use crate::recorder::SyncPolicy;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;
use tracing::info;

#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub recording: RecordingConfig,
    pub sync: SyncConfig,
    pub store: StoreConfig,
    pub api: ApiConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RecordingConfig {
    /// Seconds of captured audio per emitted chunk.
    pub chunk_interval_seconds: u64,
    /// Capture sample rate in Hz.
    pub sample_rate: u32,
}

impl RecordingConfig {
    pub fn chunk_interval(&self) -> Duration {
        Duration::from_secs(self.chunk_interval_seconds.max(1))
    }
}

impl Default for RecordingConfig {
    fn default() -> Self {
        Self {
            chunk_interval_seconds: 5,
            sample_rate: 16000,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    /// Attempts before a meeting status update is reported as failed.
    pub attempts: u32,
    /// Base backoff between attempts, multiplied by the attempt number.
    pub backoff_ms: u64,
    /// Per-attempt timeout in seconds.
    pub attempt_timeout_seconds: u64,
}

impl SyncConfig {
    pub fn policy(&self) -> SyncPolicy {
        SyncPolicy {
            attempts: self.attempts.max(1),
            backoff: Duration::from_millis(self.backoff_ms),
            attempt_timeout: Duration::from_secs(self.attempt_timeout_seconds.max(1)),
        }
    }
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            attempts: 3,
            backoff_ms: 500,
            attempt_timeout_seconds: 10,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Meeting store backend: "sqlite" (local) or "remote" (hosted API).
    pub backend: String,
    /// Base URL of the hosted backend, required when backend = "remote".
    pub remote_url: Option<String>,
    /// Bearer token for the hosted backend.
    pub api_key: Option<String>,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            backend: "sqlite".to_string(),
            remote_url: None,
            api_key: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    pub port: u16,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self { port: 7962 } // SYNC on a phone keypad
    }
}

impl Config {
    pub fn load() -> Result<Self> {
        let config_path = Self::config_path()?;
        if !config_path.exists() {
            info!(
                "Config file not found, creating default at {:?}",
                config_path
            );
            let config = Self::default();
            config.save()?;
            return Ok(config);
        }

        let contents = std::fs::read_to_string(&config_path)
            .with_context(|| format!("Failed to read config file {:?}", config_path))?;
        let config: Config = toml::from_str(&contents)
            .with_context(|| format!("Failed to parse config file {:?}", config_path))?;
        Ok(config)
    }

    pub fn save(&self) -> Result<()> {
        let config_path = Self::config_path()?;
        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent).context("Failed to create config directory")?;
        }

        let contents = toml::to_string_pretty(self).context("Failed to serialize config")?;
        std::fs::write(&config_path, contents)
            .with_context(|| format!("Failed to write config file {:?}", config_path))?;
        Ok(())
    }

    fn config_path() -> Result<PathBuf> {
        global::config_file()
    }
}
