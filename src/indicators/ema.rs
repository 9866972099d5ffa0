// =============================================================================
// Exponential Moving Average (EMA)
// =============================================================================
//
// Formula:
//   multiplier = 2 / (period + 1)
//   EMA_t      = (close_t - EMA_{t-1}) * multiplier + EMA_{t-1}
//
// The seed is the SMA of the FIRST `period` closes of the slice, and the
// recurrence then walks the remainder of that same slice. This is not a
// trailing EMA over the most recent candles: the value depends on where the
// slice starts, and MACD / longer-term fields rely on exactly that.
// =============================================================================

use crate::market_data::Candle;

/// Compute the final EMA value over `candles` with look-back `period`.
///
/// Returns `0.0` when `candles.len() < period` (or `period == 0`).
pub fn calculate_ema(candles: &[Candle], period: usize) -> f64 {
    if period == 0 || candles.len() < period {
        return 0.0;
    }

    // Seed: SMA of the first `period` values.
    let mut ema = candles[..period].iter().map(|c| c.close).sum::<f64>() / period as f64;

    let multiplier = 2.0 / (period + 1) as f64;
    for candle in &candles[period..] {
        ema = (candle.close - ema) * multiplier + ema;
    }

    ema
}
