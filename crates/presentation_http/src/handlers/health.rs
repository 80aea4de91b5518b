//! Health check handlers

use axum::{Json, extract::State};
use serde::{Deserialize, Serialize};

use crate::state::AppState;

/// Health check response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}

/// Liveness check - is the server running?
pub async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

/// Readiness response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReadinessResponse {
    pub ready: bool,
    pub rate_limiting: RateLimitStatus,
    pub signed_callbacks: bool,
}

/// Rate limiter status
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RateLimitStatus {
    pub enabled: bool,
    pub tracked_clients: usize,
}

/// Readiness check - is the server ready to accept requests?
pub async fn readiness_check(State(state): State<AppState>) -> Json<ReadinessResponse> {
    let rate_limiting = RateLimitStatus {
        enabled: state.rate_limiter.is_some(),
        tracked_clients: state
            .rate_limiter
            .as_ref()
            .map_or(0, |limiter| limiter.tracked_clients()),
    };

    Json(ReadinessResponse {
        ready: true,
        rate_limiting,
        signed_callbacks: state.signer.is_some(),
    })
}
