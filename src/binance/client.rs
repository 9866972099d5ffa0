// =============================================================================
// Binance Futures REST API Client — public market data
// =============================================================================
//
// Only unsigned endpoints are used: klines, openInterest and premiumIndex.
// Every response body is parsed as JSON first and checked for the exchange's
// `{code, msg}` error object before the HTTP status or record shape is
// examined. Calls are single-shot; nothing here retries.
// =============================================================================

use std::time::Duration;

use anyhow::{Context, Result};
use tracing::{debug, instrument};

use super::error::{check_exchange_error, FetchError};
use crate::futures_intel::{parse_funding_rate, parse_open_interest};
use crate::market_data::{Candle, Interval};
use crate::snapshot::MarketDataSource;
use crate::types::OpenInterestReading;

pub const DEFAULT_BASE_URL: &str = "https://fapi.binance.com";

/// Minimum number of fields in a kline record:
///   [0] openTime, [1] open, [2] high, [3] low, [4] close, [5] volume,
///   [6] closeTime, ... (quote volume, trade count and taker fields ignored)
const KLINE_MIN_FIELDS: usize = 7;

/// Binance USDⓈ-M futures REST client for public market data.
#[derive(Debug, Clone)]
pub struct BinanceFuturesClient {
    base_url: String,
    timeout: Duration,
    client: reqwest::Client,
}

impl BinanceFuturesClient {
    // -------------------------------------------------------------------------
    // Construction
    // -------------------------------------------------------------------------

    /// Create a client against `base_url` whose every request is bounded by
    /// `timeout`.
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let base_url = base_url.into().trim_end_matches('/').to_string();

        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .context("failed to build reqwest client for BinanceFuturesClient")?;

        debug!(base_url = %base_url, timeout_ms = timeout.as_millis() as u64, "BinanceFuturesClient initialised");

        Ok(Self {
            base_url,
            timeout,
            client,
        })
    }

    pub fn klines_url(&self, symbol: &str, interval: Interval, limit: u32) -> String {
        format!(
            "{}/fapi/v1/klines?symbol={}&interval={}&limit={}",
            self.base_url, symbol, interval, limit
        )
    }

    pub fn open_interest_url(&self, symbol: &str) -> String {
        format!("{}/fapi/v1/openInterest?symbol={}", self.base_url, symbol)
    }

    pub fn premium_index_url(&self, symbol: &str) -> String {
        format!("{}/fapi/v1/premiumIndex?symbol={}", self.base_url, symbol)
    }

    // -------------------------------------------------------------------------
    // Public market data
    // -------------------------------------------------------------------------

    /// GET /fapi/v1/klines — oldest first, including the in-progress candle.
    #[instrument(skip(self), name = "binance::get_klines")]
    pub async fn get_klines(
        &self,
        symbol: &str,
        interval: Interval,
        limit: u32,
    ) -> Result<Vec<Candle>, FetchError> {
        let body = self.get_json(&self.klines_url(symbol, interval, limit)).await?;
        let candles = parse_klines(&body)?;
        debug!(symbol, %interval, count = candles.len(), "klines fetched");
        Ok(candles)
    }

    /// GET /fapi/v1/openInterest.
    #[instrument(skip(self), name = "binance::get_open_interest")]
    pub async fn get_open_interest(&self, symbol: &str) -> Result<OpenInterestReading, FetchError> {
        let body = self.get_json(&self.open_interest_url(symbol)).await?;
        parse_open_interest(&body)
    }

    /// GET /fapi/v1/premiumIndex, returning `lastFundingRate`.
    #[instrument(skip(self), name = "binance::get_funding_rate")]
    pub async fn get_funding_rate(&self, symbol: &str) -> Result<f64, FetchError> {
        let body = self.get_json(&self.premium_index_url(symbol)).await?;
        parse_funding_rate(&body)
    }

    // -------------------------------------------------------------------------
    // Internal helpers
    // -------------------------------------------------------------------------

    async fn get_json(&self, url: &str) -> Result<serde_json::Value, FetchError> {
        let resp = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| self.transport_error(e))?;

        let status = resp.status();
        let text = resp.text().await.map_err(|e| self.transport_error(e))?;

        let body: serde_json::Value = match serde_json::from_str(&text) {
            Ok(v) => v,
            Err(_) if !status.is_success() => {
                return Err(FetchError::Status {
                    status: status.as_u16(),
                    body: text,
                })
            }
            Err(e) => return Err(FetchError::Parse(format!("invalid JSON body: {e}"))),
        };

        check_exchange_error(&body)?;

        if !status.is_success() {
            return Err(FetchError::Status {
                status: status.as_u16(),
                body: text,
            });
        }

        Ok(body)
    }

    fn transport_error(&self, e: reqwest::Error) -> FetchError {
        if e.is_timeout() {
            FetchError::Timeout {
                after_ms: self.timeout.as_millis() as u64,
            }
        } else {
            FetchError::from(e)
        }
    }
}

impl MarketDataSource for BinanceFuturesClient {
    async fn klines(
        &self,
        symbol: &str,
        interval: Interval,
        limit: u32,
    ) -> Result<Vec<Candle>, FetchError> {
        self.get_klines(symbol, interval, limit).await
    }

    async fn open_interest(&self, symbol: &str) -> Result<OpenInterestReading, FetchError> {
        self.get_open_interest(symbol).await
    }

    async fn funding_rate(&self, symbol: &str) -> Result<f64, FetchError> {
        self.get_funding_rate(symbol).await
    }
}

/// Parse Binance's array-of-arrays kline payload.
pub fn parse_klines(body: &serde_json::Value) -> Result<Vec<Candle>, FetchError> {
    check_exchange_error(body)?;

    let raw = body
        .as_array()
        .ok_or_else(|| FetchError::Parse("klines response is not an array".into()))?;

    let mut candles = Vec::with_capacity(raw.len());
    for (i, entry) in raw.iter().enumerate() {
        let arr = entry
            .as_array()
            .ok_or_else(|| FetchError::Parse(format!("kline entry {i} is not an array")))?;

        if arr.len() < KLINE_MIN_FIELDS {
            return Err(FetchError::Parse(format!(
                "kline entry {i} has {} fields, expected at least {KLINE_MIN_FIELDS}",
                arr.len()
            )));
        }

        let open_time = parse_millis(&arr[0], "openTime")?;
        let open = parse_str_f64(&arr[1], "open")?;
        let high = parse_str_f64(&arr[2], "high")?;
        let low = parse_str_f64(&arr[3], "low")?;
        let close = parse_str_f64(&arr[4], "close")?;
        let volume = parse_str_f64(&arr[5], "volume")?;
        let close_time = parse_millis(&arr[6], "closeTime")?;

        candles.push(Candle::new(open_time, open, high, low, close, volume, close_time));
    }

    Ok(candles)
}

/// Binance sends most numeric values as JSON strings; accept either form.
pub(crate) fn parse_str_f64(val: &serde_json::Value, name: &str) -> Result<f64, FetchError> {
    match val {
        serde_json::Value::String(s) => s
            .parse::<f64>()
            .map_err(|_| FetchError::Parse(format!("failed to parse {name} as f64: {s}"))),
        serde_json::Value::Number(n) => n
            .as_f64()
            .ok_or_else(|| FetchError::Parse(format!("field {name} is not a valid f64"))),
        _ => Err(FetchError::Parse(format!("field {name} has unexpected JSON type"))),
    }
}

fn parse_millis(val: &serde_json::Value, name: &str) -> Result<i64, FetchError> {
    if let Some(ms) = val.as_i64() {
        return Ok(ms);
    }
    parse_str_f64(val, name).map(|f| f as i64)
}

// =============================================================================
// Tests
// =============================================================================
#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[test]
    fn urls_use_futures_endpoints() {
        let client = BinanceFuturesClient::new("https://fapi.binance.com/", Duration::from_secs(1)).unwrap();
        assert_eq!(
            client.klines_url("BTCUSDT", Interval::Hour4, 60),
            "https://fapi.binance.com/fapi/v1/klines?symbol=BTCUSDT&interval=4h&limit=60"
        );
        assert_eq!(
            client.open_interest_url("ETHUSDT"),
            "https://fapi.binance.com/fapi/v1/openInterest?symbol=ETHUSDT"
        );
        assert_eq!(
            client.premium_index_url("ETHUSDT"),
            "https://fapi.binance.com/fapi/v1/premiumIndex?symbol=ETHUSDT"
        );
    }

    #[test]
    fn parse_klines_ok() {
        let body = json!([
            [1700000000000_i64, "37000.00", "37050.00", "36990.00", "37020.00", "123.456",
             1700000899999_i64, "4567890.12", 1500, "60.123", "2224455.66", "0"],
            [1700000900000_i64, 37020.0, 37100.5, 37000.0, 37080.25, 99.5, 1700001799999_i64]
        ]);
        let candles = parse_klines(&body).unwrap();
        assert_eq!(candles.len(), 2);
        assert_eq!(candles[0].open_time, 1_700_000_000_000);
        assert_eq!(candles[0].close_time, 1_700_000_899_999);
        assert!((candles[0].close - 37020.0).abs() < f64::EPSILON);
        assert!((candles[0].volume - 123.456).abs() < 1e-9);
        assert!((candles[1].high - 37100.5).abs() < f64::EPSILON);
    }

    #[test]
    fn parse_klines_surfaces_exchange_error_first() {
        let body = json!({"code": -1121, "msg": "Invalid symbol."});
        assert_eq!(
            parse_klines(&body),
            Err(FetchError::Exchange {
                code: -1121,
                msg: "Invalid symbol.".into()
            })
        );
    }

    #[test]
    fn parse_klines_rejects_short_record() {
        let body = json!([[1700000000000_i64, "1", "2", "0.5", "1.5"]]);
        assert!(matches!(parse_klines(&body), Err(FetchError::Parse(_))));
    }

    #[test]
    fn parse_klines_rejects_non_numeric_price() {
        let body = json!([[1_i64, "x", "2", "0.5", "1.5", "3", 2_i64]]);
        assert!(matches!(parse_klines(&body), Err(FetchError::Parse(_))));
    }

    #[test]
    fn parse_klines_rejects_object_payload() {
        let body = json!({"data": []});
        assert!(matches!(parse_klines(&body), Err(FetchError::Parse(_))));
    }

    #[test]
    fn parse_klines_empty_array() {
        assert!(parse_klines(&json!([])).unwrap().is_empty());
    }

    #[test]
    fn parse_str_f64_accepts_both_forms() {
        assert_eq!(parse_str_f64(&json!("1.25"), "x"), Ok(1.25));
        assert_eq!(parse_str_f64(&json!(2.5), "x"), Ok(2.5));
        assert!(parse_str_f64(&json!(null), "x").is_err());
    }

    // -------------------------------------------------------------------------
    // HTTP error mapping against a local mock server
    // -------------------------------------------------------------------------

    async fn mock_klines(response: ResponseTemplate) -> MockServer {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/fapi/v1/klines"))
            .respond_with(response)
            .mount(&server)
            .await;
        server
    }

    fn client_for(server: &MockServer, timeout_ms: u64) -> BinanceFuturesClient {
        BinanceFuturesClient::new(server.uri(), Duration::from_millis(timeout_ms)).unwrap()
    }

    #[tokio::test]
    async fn get_klines_parses_success_body() {
        let server = mock_klines(ResponseTemplate::new(200).set_body_json(json!([
            [1700000000000_i64, "37000.00", "37050.00", "36990.00", "37020.00", "123.456", 1700000899999_i64]
        ])))
        .await;

        let candles = client_for(&server, 1_000)
            .get_klines("BTCUSDT", Interval::Min15, 1)
            .await
            .unwrap();
        assert_eq!(candles.len(), 1);
        assert_eq!(candles[0].close, 37020.0);
    }

    #[tokio::test]
    async fn exchange_error_wins_over_http_status() {
        let server = mock_klines(
            ResponseTemplate::new(400).set_body_json(json!({"code": -1121, "msg": "Invalid symbol."})),
        )
        .await;

        let err = client_for(&server, 1_000)
            .get_klines("FOOUSDT", Interval::Hour4, 60)
            .await
            .unwrap_err();
        assert_eq!(
            err,
            FetchError::Exchange {
                code: -1121,
                msg: "Invalid symbol.".into()
            }
        );
    }

    #[tokio::test]
    async fn non_json_error_body_is_status() {
        let html = "<html><body>503 Service Unavailable</body></html>";
        let server = mock_klines(ResponseTemplate::new(503).set_body_string(html)).await;

        let err = client_for(&server, 1_000)
            .get_klines("BTCUSDT", Interval::Hour4, 60)
            .await
            .unwrap_err();
        assert_eq!(
            err,
            FetchError::Status {
                status: 503,
                body: html.into()
            }
        );
    }

    #[tokio::test]
    async fn garbage_success_body_is_parse_error() {
        let server = mock_klines(ResponseTemplate::new(200).set_body_string("not json at all")).await;

        let err = client_for(&server, 1_000)
            .get_klines("BTCUSDT", Interval::Hour4, 60)
            .await
            .unwrap_err();
        match err {
            FetchError::Parse(msg) => assert!(msg.starts_with("invalid JSON body"), "{msg}"),
            other => panic!("expected Parse, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn slow_reply_is_timeout_with_client_deadline() {
        let server = mock_klines(
            ResponseTemplate::new(200)
                .set_body_json(json!([]))
                .set_delay(Duration::from_millis(1_500)),
        )
        .await;

        let err = client_for(&server, 200)
            .get_klines("BTCUSDT", Interval::Hour4, 60)
            .await
            .unwrap_err();
        assert_eq!(err, FetchError::Timeout { after_ms: 200 });
    }
}
