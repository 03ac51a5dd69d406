//! Agent bearer-token authentication.
//!
//! Tokens have the shape `csa_<agent_id>_<opaque>`. The embedded id must
//! match the stored token's owner; stopped agents stay authenticated so a
//! restarted agent can heartbeat its way back.

use axum::extract::{Request, State};
use axum::middleware::Next;
use axum::response::Response;

use crate::api::error::ApiError;
use crate::api::state::AppState;
use crate::domain::errors::CoreError;
use crate::domain::models::Agent;

/// The authenticated agent, inserted into request extensions.
#[derive(Clone)]
pub struct AuthedAgent(pub Agent);

pub async fn require_agent(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let token = request
        .headers()
        .get(axum::http::header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .ok_or(ApiError(CoreError::AuthFailure))?;

    let claimed_id =
        Agent::id_from_token(token).ok_or(ApiError(CoreError::AuthFailure))?;

    let agent = state
        .agents
        .get_by_token(token)
        .await
        .map_err(ApiError)?
        .ok_or(ApiError(CoreError::AuthFailure))?;

    if agent.id != claimed_id {
        return Err(ApiError(CoreError::AuthFailure));
    }

    request.extensions_mut().insert(AuthedAgent(agent));
    Ok(next.run(request).await)
}
