// =============================================================================
// Open Interest — /fapi/v1/openInterest
// =============================================================================
//
// Open Interest (OI) represents the total number of outstanding derivative
// contracts. The endpoint returns a single current reading:
//
//   { "openInterest": "10659.509", "symbol": "BTCUSDT", "time": 1589437530011 }
//
// No history is requested, so the "average" is the fixed approximation
// `latest * 0.999` (see `OpenInterestReading::from_latest`).

use tracing::debug;

use crate::binance::client::parse_str_f64;
use crate::binance::FetchError;
use crate::types::OpenInterestReading;

/// Turn an openInterest response body into a reading.
pub fn parse_open_interest(body: &serde_json::Value) -> Result<OpenInterestReading, FetchError> {
    let field = body
        .get("openInterest")
        .ok_or_else(|| FetchError::Parse("openInterest response missing 'openInterest'".into()))?;
    let latest = parse_str_f64(field, "openInterest")?;

    debug!(latest, "open interest parsed");
    Ok(OpenInterestReading::from_latest(latest))
}
