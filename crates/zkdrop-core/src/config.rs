use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::limits::SizePolicy;
use crate::types::Lifetime;

/// Top-level client configuration (loaded from config.toml)
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ZkdropConfig {
    pub server: ServerConfig,
    pub limits: SizePolicy,
    pub progress: ProgressConfig,
    pub upload: UploadConfig,
    pub log: LogConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Scheme + host (+ port) of the share server; also the share link origin
    pub origin: String,
    /// Refuse plaintext HTTP origins instead of warning
    pub enforce_tls: bool,
}

/// Tuning for the progress estimator
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProgressConfig {
    /// Synthetic tick interval when byte progress is unavailable
    pub tick_interval_ms: u64,
    /// Percentage points added per synthetic tick
    pub tick_step: f64,
    /// Synthetic progress never passes this value before completion
    pub synthetic_cap: f64,
    /// Share of the bar given to the network phase of a download; the rest
    /// is reserved for decryption
    pub download_transfer_share: f64,
}

impl ProgressConfig {
    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms.max(1))
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct UploadConfig {
    /// Lifetime used when `--lifetime` is not given
    pub default_lifetime: Lifetime,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    /// Log level (default: info)
    pub level: String,
    /// Log format: "json" or "text"
    pub format: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            origin: "http://localhost:8080".into(),
            enforce_tls: false,
        }
    }
}

impl Default for ProgressConfig {
    fn default() -> Self {
        Self {
            tick_interval_ms: 100,
            tick_step: 2.5,
            synthetic_cap: 95.0,
            download_transfer_share: 80.0,
        }
    }
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: "info".into(),
            format: "text".into(),
        }
    }
}
