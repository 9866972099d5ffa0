// =============================================================================
// Simple Moving Average (SMA)
// =============================================================================
//
//   SMA = (close_{n-period} + ... + close_{n-1}) / period
//
// Always taken over the most recent `period` candles of the slice.
// =============================================================================

use crate::market_data::Candle;

/// Mean close of the last `period` candles.
///
/// Returns `0.0` when `candles.len() < period` (or `period == 0`). The same
/// value is also a legitimate result for an all-zero window; callers cannot
/// tell the two apart.
pub fn calculate_sma(candles: &[Candle], period: usize) -> f64 {
    if period == 0 || candles.len() < period {
        return 0.0;
    }

    let window = &candles[candles.len() - period..];
    window.iter().map(|c| c.close).sum::<f64>() / period as f64
}
