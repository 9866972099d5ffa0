// =============================================================================
// Trend Classifier
// =============================================================================
//
// Classifies a short ordered sequence (in practice three consecutive SMA21
// readings on the long timeframe):
//   every step strictly up   => Rising
//   every step strictly down => Falling
//   anything else, or fewer than two values => Flat
// =============================================================================

use crate::types::Trend;

pub fn classify_trend(series: &[f64]) -> Trend {
    if series.len() < 2 {
        return Trend::Flat;
    }

    if series.windows(2).all(|w| w[1] > w[0]) {
        Trend::Rising
    } else if series.windows(2).all(|w| w[1] < w[0]) {
        Trend::Falling
    } else {
        Trend::Flat
    }
}
