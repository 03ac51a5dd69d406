//! Agent self-service handlers: configuration, profile, heartbeat,
//! benchmarks, errors, shutdown.

use axum::extract::{Extension, Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::api::auth::AuthedAgent;
use crate::api::error::{ApiError, ApiResult};
use crate::api::state::AppState;
use crate::domain::errors::CoreError;
use crate::domain::models::{Agent, AgentState, Severity};
use crate::domain::ports::{AgentProfile, NewBenchmark};

/// Version of the frozen agent wire contract.
const AGENT_API_VERSION: u32 = 1;

#[derive(Serialize)]
pub struct AgentView {
    pub id: i64,
    pub name: String,
    pub state: AgentState,
    pub client_signature: Option<String>,
    pub operating_system: Option<String>,
    pub devices: Vec<String>,
    pub last_seen_at: Option<DateTime<Utc>>,
}

impl From<Agent> for AgentView {
    fn from(agent: Agent) -> Self {
        Self {
            id: agent.id,
            name: agent.name,
            state: agent.state,
            client_signature: agent.client_signature,
            operating_system: agent.operating_system,
            devices: agent.devices,
            last_seen_at: agent.last_seen_at,
        }
    }
}

#[derive(Serialize)]
pub struct AdvancedAgentConfiguration {
    agent_update_interval: u32,
    use_native_hashcat: bool,
    backend_device: Option<String>,
    opencl_devices: Option<String>,
}

#[derive(Serialize)]
pub struct ConfigurationResponse {
    advanced_agent_configuration: AdvancedAgentConfiguration,
    api_version: u32,
}

/// GET /configuration
pub async fn get_configuration(
    State(state): State<AppState>,
    Extension(AuthedAgent(_agent)): Extension<AuthedAgent>,
) -> Json<ConfigurationResponse> {
    Json(ConfigurationResponse {
        advanced_agent_configuration: AdvancedAgentConfiguration {
            agent_update_interval: state.config.limits.agent_update_interval_seconds,
            use_native_hashcat: false,
            backend_device: None,
            opencl_devices: None,
        },
        api_version: AGENT_API_VERSION,
    })
}

/// GET /agents/{id}
pub async fn get_agent(
    State(state): State<AppState>,
    Extension(AuthedAgent(agent)): Extension<AuthedAgent>,
    Path(id): Path<i64>,
) -> ApiResult<Json<AgentView>> {
    if agent.id != id {
        return Err(ApiError(CoreError::AuthFailure));
    }
    let agent = state.agents.get(id).await?;
    Ok(Json(agent.into()))
}

#[derive(Deserialize)]
pub struct UpdateAgentRequest {
    pub name: Option<String>,
    pub client_signature: Option<String>,
    pub operating_system: Option<String>,
    pub devices: Option<Vec<String>>,
}

/// PUT /agents/{id}
pub async fn update_agent(
    State(state): State<AppState>,
    Extension(AuthedAgent(agent)): Extension<AuthedAgent>,
    Path(id): Path<i64>,
    Json(body): Json<UpdateAgentRequest>,
) -> ApiResult<Json<AgentView>> {
    if agent.id != id {
        return Err(ApiError(CoreError::AuthFailure));
    }
    if let Some(name) = &body.name {
        if name.trim().is_empty() {
            return Err(ApiError(CoreError::Validation(
                "name must not be empty".into(),
            )));
        }
    }

    state
        .session
        .update_profile(
            id,
            &AgentProfile {
                name: body.name,
                client_signature: body.client_signature,
                operating_system: body.operating_system,
                devices: body.devices,
            },
        )
        .await?;
    let agent = state.agents.get(id).await?;
    Ok(Json(agent.into()))
}

#[derive(Serialize)]
pub struct HeartbeatResponse {
    state: AgentState,
}

/// POST /agents/{id}/heartbeat
///
/// 204 while active; otherwise the agent learns its server-side state.
pub async fn heartbeat(
    State(state): State<AppState>,
    Extension(AuthedAgent(agent)): Extension<AuthedAgent>,
    Path(id): Path<i64>,
) -> ApiResult<Response> {
    if agent.id != id {
        return Err(ApiError(CoreError::AuthFailure));
    }
    let agent_state = state.session.heartbeat(id).await?;
    if agent_state == AgentState::Active {
        Ok(StatusCode::NO_CONTENT.into_response())
    } else {
        Ok(Json(HeartbeatResponse { state: agent_state }).into_response())
    }
}

#[derive(Deserialize)]
pub struct BenchmarkEntry {
    pub device: u32,
    pub hash_speed: f64,
    pub hash_type: u32,
    pub runtime: i64,
}

#[derive(Deserialize)]
pub struct SubmitBenchmarkRequest {
    pub hashcat_benchmarks: Vec<BenchmarkEntry>,
}

/// POST /agents/{id}/submit_benchmark
pub async fn submit_benchmark(
    State(state): State<AppState>,
    Extension(AuthedAgent(agent)): Extension<AuthedAgent>,
    Path(id): Path<i64>,
    Json(body): Json<SubmitBenchmarkRequest>,
) -> ApiResult<StatusCode> {
    if agent.id != id {
        return Err(ApiError(CoreError::AuthFailure));
    }
    let benchmarks: Vec<NewBenchmark> = body
        .hashcat_benchmarks
        .into_iter()
        .map(|b| NewBenchmark {
            device: b.device,
            hash_type: b.hash_type,
            hash_speed: b.hash_speed,
            runtime_ms: b.runtime,
        })
        .collect();
    state.session.submit_benchmarks(id, &benchmarks).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[derive(Deserialize)]
pub struct SubmitErrorRequest {
    pub message: String,
    pub severity: Severity,
    #[serde(default)]
    pub metadata: Option<serde_json::Value>,
    #[serde(default)]
    pub task_id: Option<i64>,
}

/// POST /agents/{id}/submit_error
pub async fn submit_error(
    State(state): State<AppState>,
    Extension(AuthedAgent(agent)): Extension<AuthedAgent>,
    Path(id): Path<i64>,
    Json(body): Json<SubmitErrorRequest>,
) -> ApiResult<StatusCode> {
    if agent.id != id {
        return Err(ApiError(CoreError::AuthFailure));
    }
    state
        .session
        .submit_error(
            id,
            body.task_id,
            body.severity,
            &body.message,
            body.metadata.as_ref(),
        )
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

/// POST /agents/{id}/shutdown
pub async fn shutdown(
    State(state): State<AppState>,
    Extension(AuthedAgent(agent)): Extension<AuthedAgent>,
    Path(id): Path<i64>,
) -> ApiResult<StatusCode> {
    if agent.id != id {
        return Err(ApiError(CoreError::AuthFailure));
    }
    state.session.shutdown(id).await?;
    Ok(StatusCode::NO_CONTENT)
}
