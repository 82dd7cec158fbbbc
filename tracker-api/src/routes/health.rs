//! Health check endpoints

use axum::{extract::State, http::StatusCode, response::Json, routing::get, Router};
use serde::Serialize;
use tracker_market::RateLimiterStats;
use tracker_services::LastTick;

use crate::AppState;

/// Health check response
#[derive(Debug, Serialize)]
struct HealthResponse {
    status: String,
    tracker_running: bool,
    ticks: u64,
    last_tick: Option<LastTick>,
    total_signals: Option<usize>,
    market_data: RateLimiterStats,
}

/// Health check handler
///
/// Degraded when the tracker loop is not running or the store is unreachable.
async fn health_check(State(state): State<AppState>) -> (StatusCode, Json<HealthResponse>) {
    let total_signals = match state.store.count().await {
        Ok(count) => Some(count),
        Err(e) => {
            tracing::error!("Health check could not reach the signal store: {}", e);
            None
        }
    };
    let running = state.tracker.is_running();

    let healthy = running && total_signals.is_some();
    let response = HealthResponse {
        status: if healthy { "healthy" } else { "degraded" }.to_string(),
        tracker_running: running,
        ticks: state.tracker.tick_count(),
        last_tick: state.tracker.last_tick(),
        total_signals,
        market_data: state.rate_limiter.stats(),
    };

    let code = if healthy {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    (code, Json(response))
}

/// Simple liveness check (always returns OK if server is running)
async fn liveness() -> &'static str {
    "OK"
}

/// Create health routes
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/health", get(health_check))
        .route("/health/live", get(liveness))
}
