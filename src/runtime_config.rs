// =============================================================================
// Runtime Configuration — snapshot service settings
// =============================================================================
//
// Loaded from a JSON file, then overridden from the environment. All fields
// carry `#[serde(default)]` so that a partial (or empty) file still loads.
// =============================================================================

use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::binance::client::DEFAULT_BASE_URL;
use crate::market_data::Interval;
use crate::snapshot::SnapshotSettings;

// =============================================================================
// Default-value helpers (required by serde `default = "..."` attribute)
// =============================================================================

fn default_base_url() -> String {
    DEFAULT_BASE_URL.to_string()
}

fn default_request_timeout_ms() -> u64 {
    10_000
}

fn default_long_interval() -> Interval {
    Interval::Hour4
}

fn default_short_interval() -> Interval {
    Interval::Min15
}

fn default_long_limit() -> u32 {
    60
}

fn default_short_limit() -> u32 {
    40
}

fn default_bind_addr() -> String {
    "0.0.0.0:3001".to_string()
}

fn default_symbols() -> Vec<String> {
    vec!["BTC".to_string()]
}

// =============================================================================
// RuntimeConfig
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuntimeConfig {
    /// Binance USDⓈ-M futures REST root.
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Deadline for every individual exchange call.
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,

    /// Context timeframe (indicators, MA21 trend, "4h" change).
    #[serde(default = "default_long_interval")]
    pub long_interval: Interval,

    /// Price timeframe (current price, MA15, "1h" change).
    #[serde(default = "default_short_interval")]
    pub short_interval: Interval,

    /// Klines requested on the long timeframe. Over-fetched so EMA50 and the
    /// ten-point MACD series have history.
    #[serde(default = "default_long_limit")]
    pub long_limit: u32,

    #[serde(default = "default_short_limit")]
    pub short_limit: u32,

    /// Listen address for `serve` mode.
    #[serde(default = "default_bind_addr")]
    pub bind_addr: String,

    /// Symbols reported when none are given on the command line.
    #[serde(default = "default_symbols")]
    pub symbols: Vec<String>,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            request_timeout_ms: default_request_timeout_ms(),
            long_interval: default_long_interval(),
            short_interval: default_short_interval(),
            long_limit: default_long_limit(),
            short_limit: default_short_limit(),
            bind_addr: default_bind_addr(),
            symbols: default_symbols(),
        }
    }
}

impl RuntimeConfig {
    /// Load configuration from a JSON file at `path`.
    ///
    /// If the file does not exist, returns an error so the caller can fall
    /// back to defaults with a warning.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();

        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read runtime config from {}", path.display()))?;

        let config: Self = serde_json::from_str(&content)
            .with_context(|| format!("failed to parse runtime config from {}", path.display()))?;

        info!(
            path = %path.display(),
            long_interval = %config.long_interval,
            short_interval = %config.short_interval,
            "runtime config loaded"
        );

        Ok(config)
    }

    /// Apply `SNAPSHOT_*` overrides from a variable lookup.
    pub fn apply_env_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(url) = lookup("SNAPSHOT_BASE_URL") {
            self.base_url = url;
        }
        if let Some(addr) = lookup("SNAPSHOT_BIND_ADDR") {
            self.bind_addr = addr;
        }
        if let Some(syms) = lookup("SNAPSHOT_SYMBOLS") {
            let symbols: Vec<String> = syms
                .split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect();
            if !symbols.is_empty() {
                self.symbols = symbols;
            }
        }
    }

    /// Reject settings that could never produce a meaningful snapshot.
    pub fn validate(&self) -> Result<()> {
        if self.request_timeout_ms == 0 {
            anyhow::bail!("request_timeout_ms must be greater than zero");
        }
        if self.long_limit == 0 || self.short_limit == 0 {
            anyhow::bail!("long_limit and short_limit must be greater than zero");
        }
        if self.short_interval.duration_ms() >= self.long_interval.duration_ms() {
            anyhow::bail!(
                "short_interval ({}) must be shorter than long_interval ({})",
                self.short_interval,
                self.long_interval
            );
        }
        Ok(())
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    pub fn snapshot_settings(&self) -> SnapshotSettings {
        SnapshotSettings {
            long_interval: self.long_interval,
            short_interval: self.short_interval,
            long_limit: self.long_limit,
            short_limit: self.short_limit,
            request_timeout: self.request_timeout(),
        }
    }
}
