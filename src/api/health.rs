//! System-health endpoint.

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;

use crate::api::state::AppState;
use crate::services::ProbeStatus;

/// GET /system_health
///
/// 200 while healthy; 503 while unhealthy or when the caller raced a cold
/// cache and received the `checking` placeholder.
pub async fn system_health(State(state): State<AppState>) -> Response {
    let report = state.health.system_health().await;
    let status = match report.status {
        ProbeStatus::Healthy => StatusCode::OK,
        ProbeStatus::Unhealthy | ProbeStatus::Checking => StatusCode::SERVICE_UNAVAILABLE,
    };
    (status, Json(report)).into_response()
}
