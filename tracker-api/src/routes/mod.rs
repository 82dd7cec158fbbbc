//! API route definitions

mod health;
mod signals;
mod stats;
mod webhook;

use axum::{http::StatusCode, response::IntoResponse, Json, Router};
use serde::Serialize;

use crate::AppState;

/// Error response
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

/// `(status, {"error": ...})`
pub fn error_response(status: StatusCode, error: impl Into<String>) -> axum::response::Response {
    (
        status,
        Json(ErrorResponse {
            error: error.into(),
        }),
    )
        .into_response()
}

/// Create all API routes
pub fn api_routes() -> Router<AppState> {
    Router::new()
        .merge(signals::routes())
        .merge(stats::routes())
        .merge(health::routes())
}

/// Create Telegram webhook routes (separate from API)
pub fn webhook_routes() -> Router<AppState> {
    webhook::routes()
}
