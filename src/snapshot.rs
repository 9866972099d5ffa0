// =============================================================================
// Snapshot Aggregator — one consistent technical snapshot per request
// =============================================================================
//
// Per request:
//   1. Fan out the four exchange calls (long klines, short klines, open
//      interest, funding rate) concurrently, each bounded by the same timeout.
//   2. Required series: any fetch error, timeout, or an empty series after
//      completeness filtering fails the whole request with interval context.
//   3. Auxiliary readings: failures are logged and replaced with zeros.
//   4. Everything else is pure computation in `compose_snapshot`.
//
// Nothing is cached between requests. Dropping the returned future cancels
// every in-flight call for that request only.
// =============================================================================

use std::future::Future;
use std::time::Duration;

use anyhow::{Context, Result};
use tracing::{debug, info, warn};

use crate::binance::FetchError;
use crate::indicators::{
    calculate_atr, calculate_ema, calculate_macd, calculate_rsi, calculate_sma, classify_trend,
    rsi,
};
use crate::market_data::{filter_completed, Candle, Clock, Interval};
use crate::types::{LongerTermContext, OpenInterestReading, Snapshot};

/// Short-timeframe candles back for the "1h" change (4 x 15m).
const SHORT_CHANGE_OFFSET: usize = 4;
/// Long-timeframe candles back for the "4h" change.
const LONG_CHANGE_OFFSET: usize = 1;
/// Number of trailing positions covered by the MACD / RSI series.
const SERIES_WINDOW: usize = 10;
/// First index (0-based) with enough history for MACD (26 candles).
const MACD_MIN_INDEX: usize = 25;
/// First index (0-based) with enough history for RSI-14 (15 candles).
const RSI_MIN_INDEX: usize = 14;
const MA_LONG_PERIOD: usize = 21;
const MA_SHORT_PERIOD: usize = 15;
const TREND_POINTS: usize = 3;

// =============================================================================
// Data source seam
// =============================================================================

/// External collaborator that supplies raw market data.
pub trait MarketDataSource: Send + Sync {
    /// Klines for `symbol` oldest first, possibly including the open candle.
    fn klines(
        &self,
        symbol: &str,
        interval: Interval,
        limit: u32,
    ) -> impl Future<Output = Result<Vec<Candle>, FetchError>> + Send;

    fn open_interest(
        &self,
        symbol: &str,
    ) -> impl Future<Output = Result<OpenInterestReading, FetchError>> + Send;

    fn funding_rate(&self, symbol: &str) -> impl Future<Output = Result<f64, FetchError>> + Send;
}

/// Timeframes, fetch sizes and deadline for one snapshot request.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SnapshotSettings {
    pub long_interval: Interval,
    pub short_interval: Interval,
    pub long_limit: u32,
    pub short_limit: u32,
    pub request_timeout: Duration,
}

impl Default for SnapshotSettings {
    fn default() -> Self {
        Self {
            long_interval: Interval::Hour4,
            short_interval: Interval::Min15,
            long_limit: 60,
            short_limit: 40,
            request_timeout: Duration::from_secs(10),
        }
    }
}

// =============================================================================
// Aggregator
// =============================================================================

/// Stateless orchestrator; safe to share across concurrent requests.
pub struct SnapshotAggregator<S, C> {
    source: S,
    clock: C,
    settings: SnapshotSettings,
}

impl<S: MarketDataSource, C: Clock> SnapshotAggregator<S, C> {
    pub fn new(source: S, clock: C, settings: SnapshotSettings) -> Self {
        Self {
            source,
            clock,
            settings,
        }
    }

    pub fn settings(&self) -> &SnapshotSettings {
        &self.settings
    }

    /// Build a snapshot for an already-normalized symbol.
    pub async fn build(&self, symbol: &str) -> Result<Snapshot> {
        let s = &self.settings;

        let (long, short, open_interest, funding_rate) = tokio::join!(
            self.timed(self.source.klines(symbol, s.long_interval, s.long_limit)),
            self.timed(self.source.klines(symbol, s.short_interval, s.short_limit)),
            self.timed(self.source.open_interest(symbol)),
            self.timed(self.source.funding_rate(symbol)),
        );

        let now = self.clock.now_ms();
        let long = completed_series(long, symbol, s.long_interval, now)?;
        let short = completed_series(short, symbol, s.short_interval, now)?;

        let open_interest = open_interest.unwrap_or_else(|e| {
            warn!(symbol, error = %e, "open interest unavailable, using zero default");
            OpenInterestReading::default()
        });
        let funding_rate = funding_rate.unwrap_or_else(|e| {
            warn!(symbol, error = %e, "funding rate unavailable, using zero default");
            0.0
        });

        let snapshot = compose_snapshot(
            symbol,
            s.long_interval,
            s.short_interval,
            now,
            &long,
            &short,
            open_interest,
            funding_rate,
        );

        info!(
            symbol,
            long_candles = long.len(),
            short_candles = short.len(),
            current_price = snapshot.current_price,
            "snapshot built"
        );

        Ok(snapshot)
    }

    async fn timed<T>(
        &self,
        fut: impl Future<Output = Result<T, FetchError>>,
    ) -> Result<T, FetchError> {
        let limit = self.settings.request_timeout;
        match tokio::time::timeout(limit, fut).await {
            Ok(result) => result,
            Err(_) => Err(FetchError::Timeout {
                after_ms: limit.as_millis() as u64,
            }),
        }
    }
}

fn completed_series(
    fetched: Result<Vec<Candle>, FetchError>,
    symbol: &str,
    interval: Interval,
    now_ms: i64,
) -> Result<Vec<Candle>> {
    let raw = fetched.with_context(|| format!("failed to fetch {interval} klines for {symbol}"))?;
    let fetched_count = raw.len();

    let completed = filter_completed(raw, now_ms);
    if completed.is_empty() {
        anyhow::bail!("no completed {interval} klines for {symbol}");
    }

    let (open_window_start, _) = interval.window_bounds(now_ms);
    debug!(
        symbol,
        %interval,
        fetched = fetched_count,
        completed = completed.len(),
        open_window_start,
        "series filtered"
    );
    Ok(completed)
}

// =============================================================================
// Pure assembly
// =============================================================================

/// Assemble a snapshot from already-filtered, non-empty series.
#[allow(clippy::too_many_arguments)]
pub fn compose_snapshot(
    symbol: &str,
    long_interval: Interval,
    short_interval: Interval,
    generated_at: i64,
    long: &[Candle],
    short: &[Candle],
    open_interest: OpenInterestReading,
    funding_rate: f64,
) -> Snapshot {
    let current_price = short.last().map_or(0.0, |c| c.close);

    let price_change_1h = percent_change_from(short, SHORT_CHANGE_OFFSET, current_price);
    let price_change_4h = percent_change_from(long, LONG_CHANGE_OFFSET, current_price);

    let ma21_long_trend_series = trailing_sma_series(long, MA_LONG_PERIOD, TREND_POINTS);
    let ma21_long_trend = (ma21_long_trend_series.len() == TREND_POINTS)
        .then(|| classify_trend(&ma21_long_trend_series));

    Snapshot {
        symbol: symbol.to_string(),
        long_interval,
        short_interval,
        generated_at,
        current_price,
        price_change_1h,
        price_change_4h,
        open_interest,
        funding_rate,
        longer_term: longer_term_context(long),
        ma21_long: calculate_sma(long, MA_LONG_PERIOD),
        ma21_long_trend_series,
        ma21_long_trend,
        ma15_short: calculate_sma(short, MA_SHORT_PERIOD),
    }
}

/// Percent change of `current` against the close `offset` candles before the
/// last one. `0.0` without enough candles or with a non-positive reference.
fn percent_change_from(series: &[Candle], offset: usize, current: f64) -> f64 {
    if series.len() < offset + 1 {
        return 0.0;
    }
    let reference = series[series.len() - 1 - offset].close;
    if reference > 0.0 {
        (current - reference) / reference * 100.0
    } else {
        0.0
    }
}

/// SMA(`period`) over each of the last `points` growing prefixes, oldest
/// first. Empty unless every prefix has `period` candles.
fn trailing_sma_series(series: &[Candle], period: usize, points: usize) -> Vec<f64> {
    if series.len() < period + points - 1 {
        return Vec::new();
    }
    (series.len() - points..series.len())
        .map(|i| calculate_sma(&series[..=i], period))
        .collect()
}

/// EMA / ATR / volume context plus MACD and RSI over growing prefixes ending
/// at each of the last ten positions.
pub fn longer_term_context(long: &[Candle]) -> LongerTermContext {
    let mut ctx = LongerTermContext {
        ema20: calculate_ema(long, 20),
        ema50: calculate_ema(long, 50),
        atr3: calculate_atr(long, 3),
        atr14: calculate_atr(long, 14),
        macd_series: Vec::with_capacity(SERIES_WINDOW),
        rsi_series: Vec::with_capacity(SERIES_WINDOW),
        ..Default::default()
    };

    if let Some(last) = long.last() {
        ctx.current_volume = last.volume;
        ctx.average_volume = long.iter().map(|c| c.volume).sum::<f64>() / long.len() as f64;
    }

    for i in long.len().saturating_sub(SERIES_WINDOW)..long.len() {
        let prefix = &long[..=i];
        if i >= MACD_MIN_INDEX {
            ctx.macd_series.push(calculate_macd(prefix));
        }
        if i >= RSI_MIN_INDEX {
            ctx.rsi_series.push(calculate_rsi(prefix, rsi::DEFAULT_PERIOD));
        }
    }

    ctx
}

// =============================================================================
// Tests
// =============================================================================
#[cfg(test)]
mod tests {
    use super::*;
    use crate::market_data::FixedClock;
    use crate::types::Trend;

    const FOUR_HOURS: i64 = 4 * 60 * 60 * 1000;
    const FIFTEEN_MIN: i64 = 15 * 60 * 1000;
    /// Start of the 4h fixture; 2023-11-01 00:00:00 UTC.
    const T0: i64 = 1_698_796_800_000;

    const LONG_CLOSES: [f64; 60] = [
        34_500.0, 34_620.5, 34_580.0, 34_710.25, 34_690.0, 34_820.75, 34_905.0, 34_870.5,
        34_990.0, 35_120.25, 35_080.0, 35_210.5, 35_300.0, 35_260.75, 35_390.0, 35_450.5,
        35_410.0, 35_520.25, 35_610.0, 35_580.5, 35_700.0, 35_820.75, 35_790.0, 35_905.5,
        36_010.0, 35_980.25, 36_100.0, 36_220.5, 36_180.0, 36_300.75, 36_410.0, 36_380.5,
        36_500.0, 36_620.25, 36_590.0, 36_700.5, 36_810.0, 36_780.75, 36_900.0, 37_020.5,
        36_990.0, 37_110.25, 37_200.0, 37_170.5, 37_290.0, 37_400.75, 37_370.0, 37_480.5,
        37_590.0, 37_560.25, 37_680.0, 37_790.5, 37_760.0, 37_880.75, 37_990.0, 37_960.5,
        38_080.0, 38_190.25, 38_160.0, 38_270.5,
    ];

    const SHORT_CLOSES: [f64; 40] = [
        38_100.0, 38_112.5, 38_098.0, 38_125.25, 38_140.0, 38_131.5, 38_150.0, 38_166.75,
        38_158.0, 38_172.5, 38_190.0, 38_181.25, 38_200.0, 38_214.5, 38_205.0, 38_221.75,
        38_236.0, 38_228.5, 38_245.0, 38_260.25, 38_251.0, 38_266.5, 38_280.0, 38_272.75,
        38_290.0, 38_304.5, 38_296.0, 38_311.25, 38_325.0, 38_318.5, 38_334.0, 38_349.75,
        38_341.0, 38_356.5, 38_370.0, 38_362.25, 38_379.0, 38_394.5, 38_386.0, 38_401.75,
    ];

    fn series(closes: &[f64], start: i64, step: i64, volume_base: f64) -> Vec<Candle> {
        closes
            .iter()
            .enumerate()
            .map(|(i, &close)| {
                let open_time = start + i as i64 * step;
                let open = if i == 0 { close } else { closes[i - 1] };
                Candle::new(
                    open_time,
                    open,
                    open.max(close) + 15.0,
                    open.min(close) - 12.5,
                    close,
                    volume_base + (i % 7) as f64 * 10.0,
                    open_time + step - 1,
                )
            })
            .collect()
    }

    fn long_fixture() -> Vec<Candle> {
        series(&LONG_CLOSES, T0, FOUR_HOURS, 1_000.0)
    }

    /// Short fixture ends exactly where the long fixture ends.
    fn short_fixture() -> Vec<Candle> {
        let end = T0 + 60 * FOUR_HOURS;
        series(&SHORT_CLOSES, end - 40 * FIFTEEN_MIN, FIFTEEN_MIN, 50.0)
    }

    /// Instant at which every fixture candle has closed.
    fn fixture_now() -> i64 {
        T0 + 60 * FOUR_HOURS
    }

    #[derive(Clone)]
    struct FakeSource {
        long: Result<Vec<Candle>, FetchError>,
        short: Result<Vec<Candle>, FetchError>,
        open_interest: Result<OpenInterestReading, FetchError>,
        funding_rate: Result<f64, FetchError>,
        delay: Option<Duration>,
    }

    impl FakeSource {
        fn healthy() -> Self {
            Self {
                long: Ok(long_fixture()),
                short: Ok(short_fixture()),
                open_interest: Ok(OpenInterestReading::from_latest(85_000.0)),
                funding_rate: Ok(0.0001),
                delay: None,
            }
        }
    }

    impl MarketDataSource for FakeSource {
        async fn klines(
            &self,
            _symbol: &str,
            interval: Interval,
            _limit: u32,
        ) -> Result<Vec<Candle>, FetchError> {
            if interval == Interval::Hour4 {
                self.long.clone()
            } else {
                self.short.clone()
            }
        }

        async fn open_interest(&self, _symbol: &str) -> Result<OpenInterestReading, FetchError> {
            if let Some(d) = self.delay {
                tokio::time::sleep(d).await;
            }
            self.open_interest.clone()
        }

        async fn funding_rate(&self, _symbol: &str) -> Result<f64, FetchError> {
            if let Some(d) = self.delay {
                tokio::time::sleep(d).await;
            }
            self.funding_rate.clone()
        }
    }

    fn aggregator(source: FakeSource, now: i64) -> SnapshotAggregator<FakeSource, FixedClock> {
        SnapshotAggregator::new(source, FixedClock(now), SnapshotSettings::default())
    }

    // ---- end to end ------------------------------------------------------

    #[tokio::test]
    async fn end_to_end_snapshot_from_fixtures() {
        let snap = aggregator(FakeSource::healthy(), fixture_now())
            .build("BTCUSDT")
            .await
            .unwrap();

        let closes = &SHORT_CLOSES;
        let n = closes.len();
        assert_eq!(snap.symbol, "BTCUSDT");
        assert_eq!(snap.current_price, closes[n - 1]);

        let expected_1h = (closes[n - 1] - closes[n - 5]) / closes[n - 5] * 100.0;
        assert!((snap.price_change_1h - expected_1h).abs() < 1e-12);

        let prev_long = LONG_CLOSES[LONG_CLOSES.len() - 2];
        let expected_4h = (closes[n - 1] - prev_long) / prev_long * 100.0;
        assert!((snap.price_change_4h - expected_4h).abs() < 1e-12);

        assert_eq!(snap.ma21_long_trend_series.len(), 3);
        assert_eq!(snap.ma21_long_trend, Some(Trend::Rising));
        assert!((snap.ma21_long - snap.ma21_long_trend_series[2]).abs() < 1e-9);

        let expected_ma15 = closes[n - 15..].iter().sum::<f64>() / 15.0;
        assert!((snap.ma15_short - expected_ma15).abs() < 1e-9);

        assert_eq!(snap.longer_term.macd_series.len(), 10);
        assert_eq!(snap.longer_term.rsi_series.len(), 10);
        assert!((snap.open_interest.latest - 85_000.0).abs() < 1e-9);
        assert!((snap.funding_rate - 0.0001).abs() < 1e-15);
        assert_eq!(snap.generated_at, fixture_now());
    }

    #[tokio::test]
    async fn open_candles_are_excluded() {
        // One millisecond before the last candles close: both series lose
        // their final candle.
        let snap = aggregator(FakeSource::healthy(), fixture_now() - 2)
            .build("BTCUSDT")
            .await
            .unwrap();
        assert_eq!(snap.current_price, SHORT_CLOSES[SHORT_CLOSES.len() - 2]);
    }

    #[tokio::test]
    async fn auxiliary_failures_degrade_to_defaults() {
        let mut source = FakeSource::healthy();
        source.open_interest = Err(FetchError::Transport("connection reset".into()));
        source.funding_rate = Err(FetchError::Exchange {
            code: -1121,
            msg: "Invalid symbol.".into(),
        });

        let snap = aggregator(source, fixture_now()).build("BTCUSDT").await.unwrap();
        assert_eq!(snap.open_interest, OpenInterestReading { latest: 0.0, average: 0.0 });
        assert_eq!(snap.funding_rate, 0.0);
        assert_eq!(snap.current_price, SHORT_CLOSES[SHORT_CLOSES.len() - 1]);
    }

    #[tokio::test]
    async fn auxiliary_timeouts_degrade_to_defaults() {
        let mut source = FakeSource::healthy();
        source.delay = Some(Duration::from_secs(30));
        let settings = SnapshotSettings {
            request_timeout: Duration::from_millis(50),
            ..SnapshotSettings::default()
        };

        let agg = SnapshotAggregator::new(source, FixedClock(fixture_now()), settings);
        let snap = agg.build("BTCUSDT").await.unwrap();
        assert_eq!(snap.open_interest, OpenInterestReading::default());
        assert_eq!(snap.funding_rate, 0.0);
    }

    #[tokio::test]
    async fn long_series_failure_is_fatal_with_interval_context() {
        let mut source = FakeSource::healthy();
        source.long = Err(FetchError::Status {
            status: 503,
            body: "unavailable".into(),
        });

        let err = aggregator(source, fixture_now()).build("BTCUSDT").await.unwrap_err();
        let msg = format!("{err:#}");
        assert!(msg.contains("failed to fetch 4h klines for BTCUSDT"), "{msg}");
        assert!(err.downcast_ref::<FetchError>().is_some());
    }

    #[tokio::test]
    async fn series_with_no_closed_candles_is_fatal() {
        let err = aggregator(FakeSource::healthy(), T0 - 1)
            .build("BTCUSDT")
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "no completed 4h klines for BTCUSDT");
    }

    #[tokio::test]
    async fn empty_short_series_is_fatal() {
        let mut source = FakeSource::healthy();
        source.short = Ok(Vec::new());
        let err = aggregator(source, fixture_now()).build("BTCUSDT").await.unwrap_err();
        assert_eq!(err.to_string(), "no completed 15m klines for BTCUSDT");
    }

    // ---- pure assembly -----------------------------------------------------

    #[test]
    fn short_history_falls_back_to_zero_changes() {
        let long = long_fixture();
        let short = short_fixture();
        let snap = compose_snapshot(
            "BTCUSDT",
            Interval::Hour4,
            Interval::Min15,
            0,
            &long[..1],
            &short[..4],
            OpenInterestReading::default(),
            0.0,
        );
        assert_eq!(snap.price_change_1h, 0.0);
        assert_eq!(snap.price_change_4h, 0.0);
        assert!(snap.ma21_long_trend_series.is_empty());
        assert_eq!(snap.ma21_long_trend, None);
        assert_eq!(snap.ma21_long, 0.0);
        assert_eq!(snap.ma15_short, 0.0);
    }

    #[test]
    fn trend_series_needs_23_long_candles() {
        let long = long_fixture();
        let short = short_fixture();
        let compose = |n: usize| {
            compose_snapshot(
                "BTCUSDT",
                Interval::Hour4,
                Interval::Min15,
                0,
                &long[..n],
                &short,
                OpenInterestReading::default(),
                0.0,
            )
        };
        assert!(compose(22).ma21_long_trend_series.is_empty());
        let snap = compose(23);
        assert_eq!(snap.ma21_long_trend_series.len(), 3);
        for (k, value) in snap.ma21_long_trend_series.iter().enumerate() {
            let expected = calculate_sma(&long[..21 + k], 21);
            assert!((value - expected).abs() < 1e-9);
        }
    }

    #[test]
    fn longer_term_series_respect_history_thresholds() {
        let long = long_fixture();

        // 20 candles: indices 10..19, RSI from index 14 only, no MACD.
        let ctx = longer_term_context(&long[..20]);
        assert!(ctx.macd_series.is_empty());
        assert_eq!(ctx.rsi_series.len(), 6);

        // 30 candles: indices 20..29, MACD from index 25.
        let ctx = longer_term_context(&long[..30]);
        assert_eq!(ctx.macd_series.len(), 5);
        assert_eq!(ctx.rsi_series.len(), 10);
        assert!((ctx.macd_series[4] - calculate_macd(&long[..30])).abs() < 1e-12);
        assert!((ctx.rsi_series[0] - calculate_rsi(&long[..21], 14)).abs() < 1e-12);
    }

    #[test]
    fn longer_term_volume_and_averages() {
        let long = long_fixture();
        let ctx = longer_term_context(&long);
        assert_eq!(ctx.current_volume, long[59].volume);
        let avg = long.iter().map(|c| c.volume).sum::<f64>() / 60.0;
        assert!((ctx.average_volume - avg).abs() < 1e-9);
        assert!((ctx.ema20 - calculate_ema(&long, 20)).abs() < 1e-12);
        assert!(ctx.ema50 > 0.0);
        assert!(ctx.atr3 > 0.0 && ctx.atr14 > 0.0);
    }

    #[test]
    fn longer_term_on_empty_series_is_all_defaults() {
        assert_eq!(longer_term_context(&[]), LongerTermContext::default());
    }
}
