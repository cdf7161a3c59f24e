use axum::{body::Bytes, extract::State, http::HeaderMap, http::StatusCode, Json};
use tracing::{error, info};

use crate::api::{auth::ensure_authorized, state::AppState};
use crate::error::GovexError;
use crate::execution::{TickReport, TickRequest};

fn status_for(err: &GovexError) -> StatusCode {
    match err {
        GovexError::Validation(_) | GovexError::DirectionViolation(_) => StatusCode::BAD_REQUEST,
        GovexError::PreflightFailed(_) => StatusCode::CONFLICT,
        GovexError::Database(_) => StatusCode::SERVICE_UNAVAILABLE,
        GovexError::Broker(_) | GovexError::Http(_) => StatusCode::BAD_GATEWAY,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

fn parse_request(body: &[u8]) -> std::result::Result<TickRequest, (StatusCode, String)> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(TickRequest::default());
    }
    serde_json::from_slice(body)
        .map_err(|e| (StatusCode::BAD_REQUEST, format!("invalid request body: {e}")))
}

/// POST /api/execute
///
/// Body: `{ "force"?, "pair"?, "direction"?: "long", "preflight"?, "tick_id"? }`.
/// An empty body runs a normal tick.
pub async fn execute_tick(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> std::result::Result<Json<TickReport>, (StatusCode, String)> {
    ensure_authorized(&headers, state.api_token.as_deref())?;

    let request = parse_request(&body)?;
    info!(force = request.force, pair = ?request.pair, preflight = request.preflight, "Execution requested");

    match state.engine.run_tick(request).await {
        Ok(report) => Ok(Json(report)),
        Err(e) => {
            let status = status_for(&e);
            if status.is_server_error() {
                error!(error = %e, "Tick failed");
            }
            Err((status, e.to_string()))
        }
    }
}
