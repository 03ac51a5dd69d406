//! Cracker binary update queries.

use axum::extract::{Query, State};
use axum::Json;
use serde::{Deserialize, Serialize};

use crate::api::error::ApiResult;
use crate::api::state::AppState;

#[derive(Deserialize)]
pub struct CrackerUpdateQuery {
    pub version: String,
    pub operating_system: String,
}

#[derive(Serialize)]
pub struct CrackerUpdateResponse {
    pub available: bool,
    pub latest_version: Option<String>,
    pub download_url: Option<String>,
    pub exec_name: Option<String>,
    pub message: String,
}

/// GET /crackers/check_for_cracker_update
pub async fn check_for_cracker_update(
    State(state): State<AppState>,
    Query(query): Query<CrackerUpdateQuery>,
) -> ApiResult<Json<CrackerUpdateResponse>> {
    let update = state
        .session
        .check_cracker_update(&query.version, &query.operating_system)
        .await?;
    Ok(Json(CrackerUpdateResponse {
        available: update.available,
        latest_version: update.latest_version,
        download_url: update.download_url,
        exec_name: update.exec_name,
        message: update.message,
    }))
}
