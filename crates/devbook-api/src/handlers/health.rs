//! Liveness and readiness endpoints
//!
//! Author: hephaex@gmail.com

use crate::state::AppState;
use axum::{extract::State, http::StatusCode, Json};
use serde::Serialize;
use std::sync::Arc;
use utoipa::ToSchema;

/// Liveness payload
#[derive(Serialize, ToSchema)]
pub struct HealthResponse {
    /// Always `ok` while the process can answer
    pub status: String,
    pub service: String,
    pub version: String,
}

/// Readiness payload
#[derive(Serialize, ToSchema)]
pub struct ReadinessResponse {
    pub ready: bool,
    pub uptime_seconds: u64,
    /// Free bcrypt slots; zero means hashing requests are queueing
    pub hash_slots_available: usize,
}

#[utoipa::path(
    get,
    path = "/health",
    tag = "health",
    responses(
        (status = 200, description = "Process is alive", body = HealthResponse)
    )
)]
pub async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        service: env!("CARGO_PKG_NAME").to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

/// 503 while the server is flagged not ready
#[utoipa::path(
    get,
    path = "/ready",
    tag = "health",
    responses(
        (status = 200, description = "Accepting traffic", body = ReadinessResponse),
        (status = 503, description = "Not accepting traffic", body = ReadinessResponse)
    )
)]
pub async fn readiness_check(
    State(state): State<Arc<AppState>>,
) -> (StatusCode, Json<ReadinessResponse>) {
    let ready = state.is_ready();
    let status = if ready {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    (
        status,
        Json(ReadinessResponse {
            ready,
            uptime_seconds: state.uptime_secs(),
            hash_slots_available: state.available_hash_permits(),
        }),
    )
}
