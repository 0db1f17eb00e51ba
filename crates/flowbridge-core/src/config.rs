//! Configuration for the flow bridge.
//!
//! Resolution order: environment variables → config file → defaults.
//!
//! Config file location:
//!   1. $FLOWBRIDGE_CONFIG (explicit override)
//!   2. $XDG_CONFIG_HOME/flowbridge/config.toml
//!   3. ~/.config/flowbridge/config.toml

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::unit::DEFAULT_MAX_UNIT_SIZE;

/// Top-level configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BridgeConfig {
    pub queue: QueueConfig,
    pub flow: FlowConfig,
    pub connect: ConnectConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct QueueConfig {
    /// Receive queue capacity in units.
    pub capacity: usize,
    /// What a producer does when the queue is full.
    pub full_policy: FullQueuePolicy,
}

/// Behavior of a producer hitting a full receive queue.
///
/// `Block` parks the producer until the consumer frees a slot;
/// `EvictOldest` drops the oldest queued unit to make room. Neither
/// corrupts the queue or spins.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FullQueuePolicy {
    Block,
    EvictOldest,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FlowConfig {
    /// Maximum unit payload in bytes, shared by sender and receiver.
    /// Oversized units are rejected, not truncated.
    pub max_unit_size: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ConnectConfig {
    /// How long `connect` waits for the control plane's answer.
    pub response_timeout_ms: u64,
}

impl ConnectConfig {
    pub fn response_timeout(&self) -> Duration {
        Duration::from_millis(self.response_timeout_ms)
    }
}

// ── Defaults ──────────────────────────────────────────────────────────────────

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            queue: QueueConfig::default(),
            flow: FlowConfig::default(),
            connect: ConnectConfig::default(),
        }
    }
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            capacity: 512,
            full_policy: FullQueuePolicy::Block,
        }
    }
}

impl Default for FlowConfig {
    fn default() -> Self {
        Self {
            max_unit_size: DEFAULT_MAX_UNIT_SIZE,
        }
    }
}

impl Default for ConnectConfig {
    fn default() -> Self {
        Self {
            response_timeout_ms: 5_000,
        }
    }
}

// ── Path helpers ──────────────────────────────────────────────────────────────

fn config_dir() -> PathBuf {
    std::env::var("XDG_CONFIG_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| dirs_or_home().join(".config"))
        .join("flowbridge")
}

fn dirs_or_home() -> PathBuf {
    std::env::var("HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("/tmp"))
}

// ── Errors ────────────────────────────────────────────────────────────────────

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read {0}: {1}")]
    ReadFailed(PathBuf, std::io::Error),
    #[error("failed to parse {0}: {1}")]
    ParseFailed(PathBuf, toml::de::Error),
    #[error("failed to write {0}: {1}")]
    WriteFailed(PathBuf, std::io::Error),
    #[error("failed to serialize: {0}")]
    SerializeFailed(toml::ser::Error),
}

// ── Loading ───────────────────────────────────────────────────────────────────

impl BridgeConfig {
    /// Load config: env vars → file → defaults.
    pub fn load() -> Result<Self, ConfigError> {
        let path = Self::file_path();
        let mut config = if path.exists() {
            let text = std::fs::read_to_string(&path)
                .map_err(|e| ConfigError::ReadFailed(path.clone(), e))?;
            toml::from_str(&text).map_err(|e| ConfigError::ParseFailed(path.clone(), e))?
        } else {
            BridgeConfig::default()
        };
        config.apply_env_overrides();
        Ok(config)
    }

    /// Config file path.
    pub fn file_path() -> PathBuf {
        std::env::var("FLOWBRIDGE_CONFIG")
            .map(PathBuf::from)
            .unwrap_or_else(|_| config_dir().join("config.toml"))
    }

    /// Write default config if none exists. Returns the path.
    pub fn write_default_if_missing() -> Result<PathBuf, ConfigError> {
        let path = Self::file_path();
        if !path.exists() {
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)
                    .map_err(|e| ConfigError::WriteFailed(path.clone(), e))?;
            }
            let text = toml::to_string_pretty(&BridgeConfig::default())
                .map_err(ConfigError::SerializeFailed)?;
            std::fs::write(&path, text).map_err(|e| ConfigError::WriteFailed(path.clone(), e))?;
        }
        Ok(path)
    }

    /// Apply FLOWBRIDGE_* env var overrides.
    fn apply_env_overrides(&mut self) {
        if let Ok(v) = std::env::var("FLOWBRIDGE_QUEUE__CAPACITY") {
            if let Ok(n) = v.parse() {
                self.queue.capacity = n;
            }
        }
        if let Ok(v) = std::env::var("FLOWBRIDGE_QUEUE__FULL_POLICY") {
            match v.as_str() {
                "block" => self.queue.full_policy = FullQueuePolicy::Block,
                "evict-oldest" => self.queue.full_policy = FullQueuePolicy::EvictOldest,
                _ => {}
            }
        }
        if let Ok(v) = std::env::var("FLOWBRIDGE_FLOW__MAX_UNIT_SIZE") {
            if let Ok(n) = v.parse() {
                self.flow.max_unit_size = n;
            }
        }
        if let Ok(v) = std::env::var("FLOWBRIDGE_CONNECT__RESPONSE_TIMEOUT_MS") {
            if let Ok(n) = v.parse() {
                self.connect.response_timeout_ms = n;
            }
        }
    }
}
