// =============================================================================
// MACD line
// =============================================================================
//
//   MACD = EMA12 - EMA26
//
// Both EMAs run over the same full slice, each seeded from its own first
// `period` candles (see `ema.rs`). No signal line or histogram is produced.
// =============================================================================

use super::ema::calculate_ema;
use crate::market_data::Candle;

pub const FAST_PERIOD: usize = 12;
pub const SLOW_PERIOD: usize = 26;

/// MACD line for the whole slice. `0.0` when fewer than 26 candles.
pub fn calculate_macd(candles: &[Candle]) -> f64 {
    if candles.len() < SLOW_PERIOD {
        return 0.0;
    }

    calculate_ema(candles, FAST_PERIOD) - calculate_ema(candles, SLOW_PERIOD)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::indicators::test_support::{closes, reference_closes};

    #[test]
    fn macd_insufficient_data() {
        let candles = closes(&[100.0; 25]);
        assert_eq!(calculate_macd(&candles), 0.0);
    }

    #[test]
    fn macd_flat_series_is_zero() {
        let candles = closes(&[100.0; 40]);
        assert!(calculate_macd(&candles).abs() < 1e-10);
    }

    #[test]
    fn macd_reference_fixture() {
        let macd = calculate_macd(&reference_closes());
        assert!((macd - 4.722743278616079).abs() < 1e-9, "got {macd}");
    }

    #[test]
    fn macd_rising_series_is_positive() {
        let values: Vec<f64> = (1..=60).map(|x| x as f64).collect();
        assert!(calculate_macd(&closes(&values)) > 0.0);
    }
}
