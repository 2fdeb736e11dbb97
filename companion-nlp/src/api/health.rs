//! Health check endpoint
//!
//! Answers while models are still loading, so supervisors can tell a slow
//! start from a dead process.

use axum::{extract::State, routing::get, Json, Router};
use companion_common::BUS_PROTOCOL_VERSION;
use serde::Serialize;

use crate::{AppState, ServiceStatus};

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    /// `loading`, `ok` or `failed`
    pub status: String,
    pub module: String,
    pub version: String,
    pub protocol_version: u32,
    pub uptime_seconds: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// GET /health
pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    let (status, error) = match state.status().await {
        ServiceStatus::Loading => ("loading", None),
        ServiceStatus::Ready => ("ok", None),
        ServiceStatus::Failed(reason) => ("failed", Some(reason)),
    };

    Json(HealthResponse {
        status: status.to_string(),
        module: "companion-nlp".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        protocol_version: BUS_PROTOCOL_VERSION,
        uptime_seconds: state.startup_time.elapsed().as_secs(),
        error,
    })
}

/// Build health check routes
pub fn health_routes() -> Router<AppState> {
    Router::new().route("/health", get(health_check))
}
