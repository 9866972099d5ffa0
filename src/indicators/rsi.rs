// =============================================================================
// Relative Strength Index (RSI) — Wilder's Smoothing
// =============================================================================
//
// Step 1 — Seed average gain / average loss from the first `period`
//          close-to-close deltas (indices 1..=period), each sum / period.
// Step 2 — For every later delta:
//            up move:   avg_gain = (avg_gain * (period - 1) + delta) / period
//                       avg_loss =  avg_loss * (period - 1)          / period
//            otherwise: avg_gain =  avg_gain * (period - 1)          / period
//                       avg_loss = (avg_loss * (period - 1) - delta) / period
// Step 3 — RSI = 100 when avg_loss == 0, else 100 - 100 / (1 + gain / loss).
// =============================================================================

use crate::market_data::Candle;

pub const DEFAULT_PERIOD: usize = 14;

/// Most recent RSI over the whole slice.
///
/// Needs `period + 1` candles (`period` deltas); returns the `0.0` sentinel
/// otherwise. Note that a strictly falling series also yields `0.0`.
pub fn calculate_rsi(candles: &[Candle], period: usize) -> f64 {
    if period == 0 || candles.len() <= period {
        return 0.0;
    }

    let period_f = period as f64;

    let (gains, losses) = candles[..=period]
        .windows(2)
        .map(|w| w[1].close - w[0].close)
        .fold((0.0_f64, 0.0_f64), |(g, l), d| {
            if d > 0.0 {
                (g + d, l)
            } else {
                (g, l - d)
            }
        });

    let mut avg_gain = gains / period_f;
    let mut avg_loss = losses / period_f;

    for w in candles[period..].windows(2) {
        let delta = w[1].close - w[0].close;
        if delta > 0.0 {
            avg_gain = (avg_gain * (period_f - 1.0) + delta) / period_f;
            avg_loss = (avg_loss * (period_f - 1.0)) / period_f;
        } else {
            avg_gain = (avg_gain * (period_f - 1.0)) / period_f;
            avg_loss = (avg_loss * (period_f - 1.0) - delta) / period_f;
        }
    }

    if avg_loss == 0.0 {
        return 100.0;
    }

    let rs = avg_gain / avg_loss;
    100.0 - 100.0 / (1.0 + rs)
}
