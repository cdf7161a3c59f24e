use axum::{extract::State, Json};

use crate::api::{state::AppState, types::HealthResponse};

/// GET /api/health -- liveness probe
pub async fn health_handler(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        environment: state.engine.config().execution.environment.to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_secs: state.uptime_seconds(),
    })
}
