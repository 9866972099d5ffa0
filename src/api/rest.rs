// =============================================================================
// REST API Endpoints — Axum 0.7
// =============================================================================
//
// All endpoints live under `/api/v1/`. Each snapshot request fetches fresh
// data; the only shared state is the immutable aggregator. A client that
// disconnects drops the handler future, which cancels its in-flight fetches.
//
// CORS is configured permissively; the service exposes public market data
// only.
// =============================================================================

use std::sync::Arc;

use axum::{
    extract::{Json, Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Router,
};
use serde::Serialize;
use tower_http::cors::{Any, CorsLayer};
use tracing::{info_span, warn, Instrument};

use crate::market_data::Clock;
use crate::report::SnapshotReport;
use crate::snapshot::{MarketDataSource, SnapshotAggregator};
use crate::types::{normalize_symbol, Snapshot};

// =============================================================================
// Router construction
// =============================================================================

/// Build the REST API router with CORS middleware and shared state.
pub fn router<S, C>(aggregator: Arc<SnapshotAggregator<S, C>>) -> Router
where
    S: MarketDataSource + 'static,
    C: Clock + 'static,
{
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/api/v1/health", get(health))
        .route("/api/v1/snapshot/:symbol", get(snapshot::<S, C>))
        .route("/api/v1/snapshot/:symbol/report", get(report::<S, C>))
        .layer(cors)
        .with_state(aggregator)
}

// =============================================================================
// Errors
// =============================================================================

/// A required series could not be obtained.
#[derive(Debug)]
pub struct ApiError(anyhow::Error);

impl From<anyhow::Error> for ApiError {
    fn from(e: anyhow::Error) -> Self {
        Self(e)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = serde_json::json!({ "error": format!("{:#}", self.0) });
        (StatusCode::BAD_GATEWAY, Json(body)).into_response()
    }
}

// =============================================================================
// Health
// =============================================================================

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct HealthResponse {
    status: &'static str,
    server_time: i64,
}

async fn health() -> impl IntoResponse {
    Json(HealthResponse {
        status: "ok",
        server_time: chrono::Utc::now().timestamp_millis(),
    })
}

// =============================================================================
// Snapshot
// =============================================================================

async fn build_snapshot<S, C>(
    aggregator: &SnapshotAggregator<S, C>,
    raw_symbol: &str,
) -> Result<Snapshot, ApiError>
where
    S: MarketDataSource,
    C: Clock,
{
    let symbol = normalize_symbol(raw_symbol);
    let request_id = uuid::Uuid::new_v4();
    let span = info_span!("snapshot_request", %request_id, symbol = %symbol);

    aggregator
        .build(&symbol)
        .instrument(span)
        .await
        .map_err(|e| {
            warn!(%request_id, symbol = %symbol, error = %format!("{e:#}"), "snapshot request failed");
            ApiError::from(e)
        })
}

async fn snapshot<S, C>(
    State(aggregator): State<Arc<SnapshotAggregator<S, C>>>,
    Path(symbol): Path<String>,
) -> Result<Json<Snapshot>, ApiError>
where
    S: MarketDataSource,
    C: Clock,
{
    let snapshot = build_snapshot(&aggregator, &symbol).await?;
    Ok(Json(snapshot))
}

async fn report<S, C>(
    State(aggregator): State<Arc<SnapshotAggregator<S, C>>>,
    Path(symbol): Path<String>,
) -> Result<String, ApiError>
where
    S: MarketDataSource,
    C: Clock,
{
    let snapshot = build_snapshot(&aggregator, &symbol).await?;
    Ok(SnapshotReport(&snapshot).to_string())
}
