//! HTTP layer: the frozen `/api/v1/client` agent contract plus the public
//! system-health endpoint.

pub mod agents;
pub mod attacks;
pub mod auth;
pub mod crackers;
pub mod error;
pub mod health;
pub mod state;
pub mod tasks;

use axum::middleware;
use axum::routing::{get, post};
use axum::Router;
use tower_http::trace::TraceLayer;

pub use state::AppState;

/// Build the full application router.
pub fn router(state: AppState) -> Router {
    let client = Router::new()
        .route("/configuration", get(agents::get_configuration))
        .route(
            "/agents/{id}",
            get(agents::get_agent).put(agents::update_agent),
        )
        .route("/agents/{id}/heartbeat", post(agents::heartbeat))
        .route("/agents/{id}/submit_benchmark", post(agents::submit_benchmark))
        .route("/agents/{id}/submit_error", post(agents::submit_error))
        .route("/agents/{id}/shutdown", post(agents::shutdown))
        .route(
            "/crackers/check_for_cracker_update",
            get(crackers::check_for_cracker_update),
        )
        .route("/attacks/{id}", get(attacks::get_attack))
        .route("/attacks/{id}/hash_list", get(attacks::get_hash_list))
        .route("/tasks/new", get(tasks::request_task))
        .route("/tasks/{id}", get(tasks::get_task))
        .route("/tasks/{id}/accept_task", post(tasks::accept_task))
        .route("/tasks/{id}/exhausted", post(tasks::exhausted))
        .route("/tasks/{id}/abandon", post(tasks::abandon))
        .route("/tasks/{id}/get_zaps", get(tasks::get_zaps))
        .route("/tasks/{id}/submit_crack", post(tasks::submit_crack))
        .route("/tasks/{id}/submit_status", post(tasks::submit_status))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            auth::require_agent,
        ));

    Router::new()
        .nest("/api/v1/client", client)
        .route("/system_health", get(health::system_health))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
