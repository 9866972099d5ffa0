// =============================================================================
// Snapshot Report — plain-text rendering for prompts and terminals
// =============================================================================
//
// Field order is fixed: price, long MA21 (+ trend), short MA15 (+ distance),
// open interest, funding rate, longer-term context.
// =============================================================================

use std::fmt;

use crate::types::Snapshot;

/// Text view of a [`Snapshot`]; render with `to_string()`.
pub struct SnapshotReport<'a>(pub &'a Snapshot);

impl fmt::Display for SnapshotReport<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = self.0;
        let long = s.long_interval;
        let short = s.short_interval;

        writeln!(f, "current_price = {:.2}", s.current_price)?;
        writeln!(f)?;

        writeln!(f, "MA21_{long}: {:.2}", s.ma21_long)?;
        if let Some(trend) = s.ma21_long_trend {
            writeln!(
                f,
                "{long} trend (MA21, last 3): {trend} (series: {})",
                format_series(&s.ma21_long_trend_series)
            )?;
        }

        writeln!(f, "MA15_{short}: {:.2}", s.ma15_short)?;
        writeln!(
            f,
            "Price distance from MA15_{short}: {:.2}%",
            percent_distance(s.current_price, s.ma15_short)
        )?;
        writeln!(f)?;

        writeln!(
            f,
            "In addition, here is the latest {} open interest and funding rate for perps:",
            s.symbol
        )?;
        writeln!(f)?;
        writeln!(
            f,
            "Open Interest: Latest: {:.2} Average: {:.2}",
            s.open_interest.latest, s.open_interest.average
        )?;
        writeln!(f)?;
        writeln!(f, "Funding Rate: {}", format_scientific(s.funding_rate))?;
        writeln!(f)?;

        let lt = &s.longer_term;
        writeln!(f, "Longer-term context ({long} timeframe):")?;
        writeln!(f)?;
        writeln!(
            f,
            "20-Period EMA: {:.3} vs. 50-Period EMA: {:.3}",
            lt.ema20, lt.ema50
        )?;
        writeln!(f)?;
        writeln!(f, "3-Period ATR: {:.3} vs. 14-Period ATR: {:.3}", lt.atr3, lt.atr14)?;
        writeln!(f)?;
        writeln!(
            f,
            "Current Volume: {:.3} vs. Average Volume: {:.3}",
            lt.current_volume, lt.average_volume
        )?;
        writeln!(f)?;

        if !lt.macd_series.is_empty() {
            writeln!(f, "MACD indicators: {}", format_series(&lt.macd_series))?;
            writeln!(f)?;
        }
        if !lt.rsi_series.is_empty() {
            writeln!(f, "RSI indicators (14-Period): {}", format_series(&lt.rsi_series))?;
            writeln!(f)?;
        }

        Ok(())
    }
}

/// Percent distance of `price` from `reference`; `0.0` when the reference is
/// the zero sentinel.
fn percent_distance(price: f64, reference: f64) -> f64 {
    if reference == 0.0 {
        return 0.0;
    }
    (price - reference) / reference * 100.0
}

/// `[1.000, 2.500]` with three decimals per value.
fn format_series(values: &[f64]) -> String {
    let parts: Vec<String> = values.iter().map(|v| format!("{v:.3}")).collect();
    format!("[{}]", parts.join(", "))
}

/// Two-decimal scientific notation with a signed two-digit exponent,
/// e.g. `1.00e-04`.
fn format_scientific(value: f64) -> String {
    let raw = format!("{value:.2e}");
    let Some((mantissa, exponent)) = raw.split_once('e') else {
        return raw;
    };
    let Ok(exp) = exponent.parse::<i32>() else {
        return raw;
    };
    let sign = if exp < 0 { '-' } else { '+' };
    format!("{mantissa}e{sign}{:02}", exp.abs())
}
