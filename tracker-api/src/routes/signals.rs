//! Signal listing and detail endpoints

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tracing::{debug, error};
use tracker_core::{PricePoint, Signal, SignalStatus};
use tracker_services::SignalQuery;

use super::error_response;
use crate::AppState;

/// Upper bound on a single page
const MAX_PAGE_SIZE: usize = 500;

/// Query parameters for listing signals
#[derive(Debug, Deserialize)]
pub struct ListSignalsQuery {
    /// Maximum number of results (default 50)
    pub limit: Option<usize>,
    pub offset: Option<usize>,
    /// Filter by status (monitoring or completed)
    pub status: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct SignalsResponse {
    pub signals: Vec<Signal>,
    pub count: usize,
}

#[derive(Debug, Serialize)]
pub struct SignalDetailResponse {
    pub signal: Signal,
    pub price_history: Vec<PricePoint>,
}

/// Create signal routes
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/signals", get(list_signals))
        .route("/signals/{address}", get(get_signal))
}

/// List signals, most recent first
async fn list_signals(
    State(state): State<AppState>,
    Query(params): Query<ListSignalsQuery>,
) -> impl IntoResponse {
    let defaults = SignalQuery::default();
    let mut query = SignalQuery::new(
        params.limit.unwrap_or(defaults.limit).min(MAX_PAGE_SIZE),
        params.offset.unwrap_or(0),
    );

    if let Some(status) = params.status.as_deref() {
        match status.parse::<SignalStatus>() {
            Ok(status) => query = query.with_status(status),
            Err(e) => return error_response(StatusCode::BAD_REQUEST, e),
        }
    }

    match state.aggregation.list_signals(query).await {
        Ok(signals) => {
            let count = signals.len();
            debug!("Returning {} signals", count);
            (StatusCode::OK, Json(SignalsResponse { signals, count })).into_response()
        }
        Err(e) => {
            error!("Failed to list signals: {}", e);
            error_response(StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
        }
    }
}

/// One signal with its polled price history
async fn get_signal(
    State(state): State<AppState>,
    Path(address): Path<String>,
) -> impl IntoResponse {
    let signal = match state.store.get(&address).await {
        Ok(Some(signal)) => signal,
        Ok(None) => {
            return error_response(
                StatusCode::NOT_FOUND,
                format!("Signal not found: {}", address),
            )
        }
        Err(e) => {
            error!("Failed to load signal {}: {}", address, e);
            return error_response(StatusCode::INTERNAL_SERVER_ERROR, e.to_string());
        }
    };

    match state.store.price_history(&address).await {
        Ok(price_history) => (
            StatusCode::OK,
            Json(SignalDetailResponse {
                signal,
                price_history,
            }),
        )
            .into_response(),
        Err(e) => {
            error!("Failed to load price history for {}: {}", address, e);
            error_response(StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
        }
    }
}
