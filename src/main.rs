// =============================================================================
// Market Snapshot — Main Entry Point
// =============================================================================
//
// Two modes:
//   market-snapshot serve            HTTP API on `bind_addr`
//   market-snapshot [SYMBOL ...]     print one report per symbol and exit
//
// In report mode any failed symbol makes the process exit non-zero after the
// remaining symbols have been attempted.
// =============================================================================

// ── Module declarations ──────────────────────────────────────────────────────
mod api;
mod binance;
mod futures_intel;
mod indicators;
mod market_data;
mod report;
mod runtime_config;
mod snapshot;
mod types;

use std::sync::Arc;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use crate::binance::BinanceFuturesClient;
use crate::market_data::SystemClock;
use crate::report::SnapshotReport;
use crate::runtime_config::RuntimeConfig;
use crate::snapshot::SnapshotAggregator;
use crate::types::normalize_symbol;

type Aggregator = SnapshotAggregator<BinanceFuturesClient, SystemClock>;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // ── 1. Environment & config ──────────────────────────────────────────
    let _ = dotenv::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let config_path =
        std::env::var("SNAPSHOT_CONFIG").unwrap_or_else(|_| "snapshot_config.json".into());
    let mut config = RuntimeConfig::load(&config_path).unwrap_or_else(|e| {
        warn!(error = %e, "Failed to load config, using defaults");
        RuntimeConfig::default()
    });
    config.apply_env_overrides(|key| std::env::var(key).ok());
    config.validate()?;

    // ── 2. Exchange client & aggregator ──────────────────────────────────
    let client = BinanceFuturesClient::new(config.base_url.clone(), config.request_timeout())?;
    let aggregator = Arc::new(SnapshotAggregator::new(
        client,
        SystemClock,
        config.snapshot_settings(),
    ));

    let settings = aggregator.settings();
    info!(
        base_url = %config.base_url,
        long_interval = %settings.long_interval,
        short_interval = %settings.short_interval,
        timeout_ms = config.request_timeout_ms,
        "Snapshot aggregator ready"
    );

    // ── 3. Dispatch ──────────────────────────────────────────────────────
    let args: Vec<String> = std::env::args().skip(1).collect();
    if args.first().is_some_and(|a| a == "serve") {
        return serve(aggregator, &config.bind_addr).await;
    }

    let symbols = if args.is_empty() { config.symbols } else { args };
    print_reports(&aggregator, &symbols).await
}

/// Run the HTTP API until Ctrl+C.
async fn serve(aggregator: Arc<Aggregator>, bind_addr: &str) -> anyhow::Result<()> {
    let app = api::rest::router(aggregator);
    let listener = tokio::net::TcpListener::bind(bind_addr)
        .await
        .map_err(|e| anyhow::anyhow!("failed to bind API server on {bind_addr}: {e}"))?;
    info!(addr = %bind_addr, "API server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                error!(error = %e, "Failed to listen for shutdown signal");
            }
            warn!("Shutdown signal received — stopping gracefully");
        })
        .await?;

    info!("Market snapshot server shut down complete.");
    Ok(())
}

/// Print one report per symbol to stdout; errors go to the log.
async fn print_reports(aggregator: &Aggregator, symbols: &[String]) -> anyhow::Result<()> {
    let mut failed = 0usize;

    for raw in symbols {
        let symbol = normalize_symbol(raw);
        match aggregator.build(&symbol).await {
            Ok(snapshot) => {
                println!("=== {symbol} ===");
                println!("{}", SnapshotReport(&snapshot));
            }
            Err(e) => {
                error!(symbol = %symbol, error = %format!("{e:#}"), "Snapshot failed");
                failed += 1;
            }
        }
    }

    if failed > 0 {
        anyhow::bail!("{failed} of {} snapshots failed", symbols.len());
    }
    Ok(())
}
