// =============================================================================
// Funding Rate — /fapi/v1/premiumIndex
// =============================================================================
//
// Funding rates are periodic payments between longs and shorts that anchor the
// perpetual contract price to spot. The premium index endpoint reports the
// most recent settled rate as a decimal string (e.g. "0.00010000" = 0.01%).

use tracing::debug;

use crate::binance::client::parse_str_f64;
use crate::binance::FetchError;

/// Extract `lastFundingRate` from a premiumIndex response body.
pub fn parse_funding_rate(body: &serde_json::Value) -> Result<f64, FetchError> {
    let field = body.get("lastFundingRate").ok_or_else(|| {
        FetchError::Parse("premiumIndex response missing 'lastFundingRate'".into())
    })?;
    let rate = parse_str_f64(field, "lastFundingRate")?;

    debug!(rate_pct = format!("{:.4}", rate * 100.0), "funding rate parsed");
    Ok(rate)
}
