// =============================================================================
// Technical Indicators Module
// =============================================================================
//
// Pure, side-effect-free implementations of the indicators that feed the
// market snapshot. Every function takes an oldest-first candle slice and
// returns a plain `f64`. Insufficient history is reported as `0.0`, which is
// also a valid computed value for some inputs (e.g. RSI of a falling series);
// callers that need to tell the two apart must check the slice length.

pub mod atr;
pub mod ema;
pub mod macd;
pub mod rsi;
pub mod sma;
pub mod trend;

pub use atr::calculate_atr;
pub use ema::calculate_ema;
pub use macd::calculate_macd;
pub use rsi::calculate_rsi;
pub use sma::calculate_sma;
pub use trend::classify_trend;
