// =============================================================================
// Shared types for the market snapshot service
// =============================================================================

use serde::{Deserialize, Serialize};

use crate::market_data::Interval;

/// Open interest for a perpetual contract.
///
/// `average` is `latest * 0.999`, a fixed approximation; no history is
/// averaged.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct OpenInterestReading {
    pub latest: f64,
    pub average: f64,
}

impl OpenInterestReading {
    /// Discount applied to `latest` to derive `average`.
    pub const AVERAGE_FACTOR: f64 = 0.999;

    pub fn from_latest(latest: f64) -> Self {
        Self {
            latest,
            average: latest * Self::AVERAGE_FACTOR,
        }
    }
}

/// Indicator context computed over the long-timeframe series.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LongerTermContext {
    pub ema20: f64,
    pub ema50: f64,
    pub atr3: f64,
    pub atr14: f64,
    pub current_volume: f64,
    pub average_volume: f64,
    /// MACD over growing prefixes, oldest first, at most 10 values.
    pub macd_series: Vec<f64>,
    /// RSI-14 over growing prefixes, oldest first, at most 10 values.
    pub rsi_series: Vec<f64>,
}

/// Direction of a short numeric sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Trend {
    Rising,
    Falling,
    Flat,
}

impl std::fmt::Display for Trend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Rising => write!(f, "rising"),
            Self::Falling => write!(f, "falling"),
            Self::Flat => write!(f, "flat"),
        }
    }
}

/// Point-in-time technical snapshot for one symbol. Built once, never
/// updated in place.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Snapshot {
    pub symbol: String,
    pub long_interval: Interval,
    pub short_interval: Interval,
    /// Clock reading (UNIX ms) used for completeness filtering.
    pub generated_at: i64,
    pub current_price: f64,
    pub price_change_1h: f64,
    pub price_change_4h: f64,
    pub open_interest: OpenInterestReading,
    pub funding_rate: f64,
    pub longer_term: LongerTermContext,
    pub ma21_long: f64,
    /// SMA21 over the last three growing prefixes; empty with < 23 candles.
    pub ma21_long_trend_series: Vec<f64>,
    /// Classification of `ma21_long_trend_series`, present only when the
    /// three values exist.
    pub ma21_long_trend: Option<Trend>,
    pub ma15_short: f64,
}

/// Upper-case the input and append `USDT` unless it already ends with it.
pub fn normalize_symbol(symbol: &str) -> String {
    let upper = symbol.to_uppercase();
    if upper.ends_with("USDT") {
        upper
    } else {
        format!("{upper}USDT")
    }
}
