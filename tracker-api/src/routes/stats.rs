//! Statistics endpoints

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use serde::Deserialize;
use tracing::error;
use tracker_services::Timeframe;

use super::error_response;
use crate::AppState;

const DEFAULT_HOT_LIMIT: usize = 10;
const DEFAULT_PERFORMANCE_LIMIT: usize = 50;
const MAX_LIMIT: usize = 500;

#[derive(Debug, Deserialize)]
pub struct SummaryQuery {
    /// 24h, 7d or 30d (default 24h)
    pub timeframe: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct LimitQuery {
    pub limit: Option<usize>,
}

#[derive(Debug, Deserialize)]
pub struct PerformanceQuery {
    /// Checkpoint label, defaults to the final checkpoint
    pub checkpoint: Option<String>,
    pub limit: Option<usize>,
}

/// Create stats routes
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/stats", get(global_stats))
        .route("/stats/{scope}", get(scope_summary))
        .route("/hot/{scope}", get(hot_signals))
        .route("/performance", get(performance))
}

/// Totals across every scope
async fn global_stats(State(state): State<AppState>) -> impl IntoResponse {
    match state.aggregation.global_stats().await {
        Ok(stats) => (StatusCode::OK, Json(stats)).into_response(),
        Err(e) => {
            error!("Failed to compute global stats: {}", e);
            error_response(StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
        }
    }
}

/// Summary of one scope over a timeframe
async fn scope_summary(
    State(state): State<AppState>,
    Path(scope): Path<String>,
    Query(params): Query<SummaryQuery>,
) -> impl IntoResponse {
    let timeframe = match params.timeframe.as_deref() {
        None => Timeframe::default(),
        Some(raw) => match raw.parse::<Timeframe>() {
            Ok(timeframe) => timeframe,
            Err(e) => return error_response(StatusCode::BAD_REQUEST, e),
        },
    };

    match state.aggregation.summarize(&scope, timeframe).await {
        Ok(summary) => (StatusCode::OK, Json(summary)).into_response(),
        Err(e) => {
            error!("Failed to summarize scope {}: {}", scope, e);
            error_response(StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
        }
    }
}

/// Signals of a scope ranked by current return
async fn hot_signals(
    State(state): State<AppState>,
    Path(scope): Path<String>,
    Query(params): Query<LimitQuery>,
) -> impl IntoResponse {
    let limit = params.limit.unwrap_or(DEFAULT_HOT_LIMIT).min(MAX_LIMIT);

    match state.aggregation.hot_signals(&scope, limit).await {
        Ok(ranked) => (StatusCode::OK, Json(ranked)).into_response(),
        Err(e) => {
            error!("Failed to rank scope {}: {}", scope, e);
            error_response(StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
        }
    }
}

/// Returns recorded at one checkpoint
async fn performance(
    State(state): State<AppState>,
    Query(params): Query<PerformanceQuery>,
) -> impl IntoResponse {
    let schedule = state.aggregation.schedule();
    let checkpoint = params
        .checkpoint
        .unwrap_or_else(|| schedule.final_checkpoint().label.clone());

    if !schedule.contains(&checkpoint) {
        let known: Vec<&str> = schedule.iter().map(|c| c.label.as_str()).collect();
        return error_response(
            StatusCode::BAD_REQUEST,
            format!("Unknown checkpoint '{}', expected one of {}", checkpoint, known.join(", ")),
        );
    }

    let limit = params.limit.unwrap_or(DEFAULT_PERFORMANCE_LIMIT).min(MAX_LIMIT);
    match state.aggregation.performance(&checkpoint, limit).await {
        Ok(performance) => (StatusCode::OK, Json(performance)).into_response(),
        Err(e) => {
            error!("Failed to load {} performance: {}", checkpoint, e);
            error_response(StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
        }
    }
}
