pub mod candle;
pub mod completeness;

// Re-export the Candle struct for convenient access (e.g. `use crate::market_data::Candle`).
pub use candle::{Candle, Interval};
pub use completeness::{filter_completed, Clock, SystemClock};
#[cfg(test)]
pub use completeness::FixedClock;
