//! Health check endpoints.

use axum::{
    Json,
    extract::State,
    http::{StatusCode, header},
    response::IntoResponse,
};
use serde::Serialize;

use crate::state::AppState;

#[derive(Serialize)]
pub struct HealthResponse {
    status: &'static str,
    version: &'static str,
}

/// Basic health check (is the server running?)
pub async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}

#[derive(Serialize)]
pub struct ReadyResponse {
    status: &'static str,
    database: bool,
}

/// Readiness check (is the database reachable?)
pub async fn ready_check(State(state): State<AppState>) -> Result<Json<ReadyResponse>, StatusCode> {
    match state.storage.ping().await {
        Ok(()) => Ok(Json(ReadyResponse {
            status: "ready",
            database: true,
        })),
        Err(e) => {
            tracing::warn!(error = %e, "Database ping failed");
            // Return 503 if not ready
            Err(StatusCode::SERVICE_UNAVAILABLE)
        }
    }
}

/// Prometheus scrape endpoint
pub async fn metrics(State(state): State<AppState>) -> Result<impl IntoResponse, StatusCode> {
    let body = state.metrics.encode_text().map_err(|e| {
        tracing::error!(error = %e, "Failed to encode metrics");
        StatusCode::INTERNAL_SERVER_ERROR
    })?;
    Ok(([(header::CONTENT_TYPE, "text/plain; version=0.0.4")], body))
}
