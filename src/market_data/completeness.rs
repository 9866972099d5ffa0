// =============================================================================
// Candle Completeness — drop klines that have not closed yet
// =============================================================================
//
// The kline endpoint always returns the in-progress candle as the last entry.
// Indicators must only see closed candles, so every fetched series is passed
// through `filter_completed` against an injectable clock.
// =============================================================================

use chrono::Utc;

use super::candle::Candle;

/// Source of "now" in UNIX milliseconds.
pub trait Clock: Send + Sync {
    fn now_ms(&self) -> i64;
}

/// Wall-clock time from the operating system.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_ms(&self) -> i64 {
        Utc::now().timestamp_millis()
    }
}

/// A clock frozen at a fixed instant.
#[cfg(test)]
#[derive(Debug, Clone, Copy)]
pub struct FixedClock(pub i64);

#[cfg(test)]
impl Clock for FixedClock {
    fn now_ms(&self) -> i64 {
        self.0
    }
}

/// Return the candles whose `close_time <= now_ms`, preserving order.
///
/// Every candle is tested, not only the trailing one, so a series that is not
/// perfectly ordered at the boundary still yields only closed candles.
pub fn filter_completed(candles: Vec<Candle>, now_ms: i64) -> Vec<Candle> {
    candles
        .into_iter()
        .filter(|c| c.is_closed_at(now_ms))
        .collect()
}
