//! Task lifecycle handlers: request, accept, status, cracks, zaps.

use axum::body::Body;
use axum::extract::{Extension, Path, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::api::auth::AuthedAgent;
use crate::api::error::{ApiError, ApiResult};
use crate::api::state::AppState;
use crate::domain::errors::CoreError;
use crate::domain::models::{DeviceStatus, HashcatGuess, HashcatStatus, Task, TaskState};
use crate::services::{CrackResult, CrackSubmission, StatusAck};

/// Page size for streamed hash and zap lists.
const LIST_PAGE_SIZE: i64 = 1000;

#[derive(Serialize)]
pub struct TaskView {
    pub id: i64,
    pub attack_id: i64,
    pub state: TaskState,
    pub stale: bool,
    pub start_date: DateTime<Utc>,
    pub activity_timestamp: Option<DateTime<Utc>>,
    pub progress_percent: f64,
}

impl From<Task> for TaskView {
    fn from(task: Task) -> Self {
        Self {
            id: task.id,
            attack_id: task.attack_id,
            state: task.state,
            stale: task.stale,
            start_date: task.start_date,
            activity_timestamp: task.activity_timestamp,
            progress_percent: task.progress_percent,
        }
    }
}

/// GET /tasks/new — 200 with the next task, or 204 when none.
pub async fn request_task(
    State(state): State<AppState>,
    Extension(AuthedAgent(agent)): Extension<AuthedAgent>,
) -> ApiResult<Response> {
    match state.assignment.next_task(&agent).await? {
        Some(task) => Ok(Json(TaskView::from(task)).into_response()),
        None => Ok(StatusCode::NO_CONTENT.into_response()),
    }
}

/// GET /tasks/{id}
pub async fn get_task(
    State(state): State<AppState>,
    Extension(AuthedAgent(agent)): Extension<AuthedAgent>,
    Path(id): Path<i64>,
) -> ApiResult<Json<TaskView>> {
    let task = state.task_flow.get_owned(agent.id, id).await?;
    Ok(Json(task.into()))
}

/// POST /tasks/{id}/accept_task — 204, or 422 when already finished.
pub async fn accept_task(
    State(state): State<AppState>,
    Extension(AuthedAgent(agent)): Extension<AuthedAgent>,
    Path(id): Path<i64>,
) -> ApiResult<StatusCode> {
    state.task_flow.accept(agent.id, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// POST /tasks/{id}/exhausted
pub async fn exhausted(
    State(state): State<AppState>,
    Extension(AuthedAgent(agent)): Extension<AuthedAgent>,
    Path(id): Path<i64>,
) -> ApiResult<StatusCode> {
    state.task_flow.exhaust(agent.id, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// POST /tasks/{id}/abandon — 200 `{success, state}`.
pub async fn abandon(
    State(state): State<AppState>,
    Extension(AuthedAgent(agent)): Extension<AuthedAgent>,
    Path(id): Path<i64>,
) -> ApiResult<Json<serde_json::Value>> {
    let task = state.task_flow.abandon(agent.id, id).await?;
    Ok(Json(json!({ "success": true, "state": task.state.as_str() })))
}

/// GET /tasks/{id}/get_zaps — stream the cracked list, clear the stale flag.
pub async fn get_zaps(
    State(state): State<AppState>,
    Extension(AuthedAgent(agent)): Extension<AuthedAgent>,
    Path(id): Path<i64>,
) -> ApiResult<Response> {
    let task = state.task_flow.get_owned(agent.id, id).await?;
    let campaign = state.attacks.campaign_of(task.attack_id).await?;

    state.task_flow.zaps_downloaded(task.id).await?;

    let hash_lists = state.hash_lists.clone();
    let hash_list_id = campaign.hash_list_id;
    let stream = futures::stream::try_unfold(0_i64, move |after_id| {
        let hash_lists = hash_lists.clone();
        async move {
            let page = hash_lists
                .cracked_page(hash_list_id, after_id, LIST_PAGE_SIZE)
                .await?;
            let Some(&(last_id, _)) = page.last() else {
                return Ok::<_, CoreError>(None);
            };
            let mut chunk = String::with_capacity(page.len() * 40);
            for (_, line) in &page {
                chunk.push_str(line);
                chunk.push('\n');
            }
            Ok(Some((axum::body::Bytes::from(chunk), last_id)))
        }
    });

    Ok(Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, "text/plain; charset=utf-8")
        .body(Body::from_stream(stream))
        .map_err(|e| ApiError(CoreError::Internal(e.to_string())))?)
}

#[derive(Deserialize)]
pub struct SubmitCrackRequest {
    pub hash: String,
    pub plain_text: String,
    pub timestamp: DateTime<Utc>,
}

/// POST /tasks/{id}/submit_crack — 204 when the task completes, 200 with a
/// message otherwise.
pub async fn submit_crack(
    State(state): State<AppState>,
    Extension(AuthedAgent(agent)): Extension<AuthedAgent>,
    Path(id): Path<i64>,
    Json(body): Json<SubmitCrackRequest>,
) -> ApiResult<Response> {
    let result = state
        .crack
        .submit_crack(
            agent.id,
            id,
            &CrackSubmission {
                hash_value: body.hash,
                plain_text: body.plain_text,
                timestamp: body.timestamp,
            },
        )
        .await?;

    match result {
        CrackResult::TaskCompleted => Ok(StatusCode::NO_CONTENT.into_response()),
        CrackResult::Accepted { uncracked_remaining } => Ok(Json(json!({
            "message": format!("{uncracked_remaining} uncracked hashes remain")
        }))
        .into_response()),
    }
}

#[derive(Deserialize)]
pub struct SubmitStatusRequest {
    pub session: String,
    pub status: i32,
    pub time_start: DateTime<Utc>,
    #[serde(default)]
    pub estimated_stop: Option<DateTime<Utc>>,
    /// `[done, total]`
    pub progress: [i64; 2],
    #[serde(default)]
    pub restore_point: i64,
    #[serde(default)]
    pub rejected: i64,
    #[serde(default)]
    pub hashcat_guess: Option<HashcatGuess>,
    #[serde(default)]
    pub device_statuses: Option<Vec<DeviceStatus>>,
}

/// POST /tasks/{id}/submit_status — 204 ok / 202 stale / 410 paused / 422.
pub async fn submit_status(
    State(state): State<AppState>,
    Extension(AuthedAgent(agent)): Extension<AuthedAgent>,
    Path(id): Path<i64>,
    Json(body): Json<SubmitStatusRequest>,
) -> ApiResult<Response> {
    let Some(guess) = body.hashcat_guess else {
        return Err(ApiError(CoreError::Validation(
            "hashcat_guess is missing".into(),
        )));
    };
    let Some(devices) = body.device_statuses else {
        return Err(ApiError(CoreError::Validation(
            "device_statuses is missing".into(),
        )));
    };

    let status = HashcatStatus {
        id: 0,
        task_id: id,
        session: body.session,
        status: body.status,
        time_start: body.time_start,
        estimated_stop: body.estimated_stop,
        progress_done: body.progress[0],
        progress_total: body.progress[1],
        restore_point: body.restore_point,
        rejected: body.rejected,
        guess,
        devices,
        created_at: Utc::now(),
    };

    match state.status.submit_status(agent.id, id, status).await? {
        StatusAck::Ok => Ok(StatusCode::NO_CONTENT.into_response()),
        StatusAck::Stale => Ok(StatusCode::ACCEPTED.into_response()),
        StatusAck::Paused => Ok(StatusCode::GONE.into_response()),
    }
}
