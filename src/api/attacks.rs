//! Attack descriptor and hash-list download handlers.

use axum::body::Body;
use axum::extract::{Extension, Path, State};
use axum::http::{header, StatusCode};
use axum::response::Response;
use axum::Json;
use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::api::auth::AuthedAgent;
use crate::api::error::{ApiError, ApiResult};
use crate::api::state::AppState;
use crate::domain::errors::CoreError;
use crate::domain::models::{Attack, AttackState};

const LIST_PAGE_SIZE: i64 = 1000;

/// A presigned resource reference inside an attack view.
#[derive(Serialize)]
pub struct ResourceView {
    pub id: i64,
    pub file_name: String,
    pub download_url: String,
    pub checksum: String,
}

#[derive(Serialize)]
pub struct AttackView {
    pub id: i64,
    pub campaign_id: i64,
    pub attack_mode: String,
    pub attack_mode_hashcat: u8,
    pub hash_mode: u32,
    pub state: AttackState,
    pub mask: Option<String>,
    pub increment_mode: bool,
    pub increment_minimum: Option<u32>,
    pub increment_maximum: Option<u32>,
    pub optimized: bool,
    pub slow_candidate_generators: bool,
    pub workload_profile: u8,
    pub disable_markov: bool,
    pub classic_markov: bool,
    pub markov_threshold: Option<u32>,
    pub custom_charset_1: Option<String>,
    pub custom_charset_2: Option<String>,
    pub custom_charset_3: Option<String>,
    pub custom_charset_4: Option<String>,
    pub left_rule: Option<String>,
    pub right_rule: Option<String>,
    pub complexity_value: i64,
    pub word_list: Option<ResourceView>,
    pub rule_list: Option<ResourceView>,
    pub mask_list: Option<ResourceView>,
    pub current_eta: Option<DateTime<Utc>>,
    pub total_eta: Option<DateTime<Utc>>,
}

async fn resource_view(
    state: &AppState,
    resource_id: Option<i64>,
) -> ApiResult<Option<ResourceView>> {
    let Some(id) = resource_id else {
        return Ok(None);
    };
    let resource = state.attacks.resource(id).await?;
    Ok(Some(ResourceView {
        id: resource.id,
        file_name: resource.name,
        download_url: state.object_store.presigned_url(&resource.store_key),
        checksum: resource.checksum,
    }))
}

/// GET /attacks/{id}
pub async fn get_attack(
    State(state): State<AppState>,
    Extension(AuthedAgent(agent)): Extension<AuthedAgent>,
    Path(id): Path<i64>,
) -> ApiResult<Json<AttackView>> {
    let attack: Attack = state.attacks.get(id).await?;
    let campaign = state.attacks.campaign_of(id).await?;

    // Resources must only be visible to agents of the owning project.
    let project_ids = state.agents.project_ids(agent.id).await?;
    if !project_ids.contains(&campaign.project_id) {
        return Err(ApiError(CoreError::NotFound {
            entity: "attack",
            id,
        }));
    }

    let eta = state.eta.campaign_eta(campaign.id).await?;
    let word_list = resource_view(&state, attack.word_list_id).await?;
    let rule_list = resource_view(&state, attack.rule_list_id).await?;
    let mask_list = resource_view(&state, attack.mask_list_id).await?;

    Ok(Json(AttackView {
        id: attack.id,
        campaign_id: attack.campaign_id,
        attack_mode: attack.attack_mode.as_str().to_string(),
        attack_mode_hashcat: attack.attack_mode.hashcat_mode(),
        hash_mode: attack.hash_mode,
        state: attack.state,
        mask: attack.mask,
        increment_mode: attack.increment_mode,
        increment_minimum: attack.increment_minimum,
        increment_maximum: attack.increment_maximum,
        optimized: attack.optimized,
        slow_candidate_generators: attack.slow_candidate_generators,
        workload_profile: attack.workload_profile,
        disable_markov: attack.disable_markov,
        classic_markov: attack.classic_markov,
        markov_threshold: attack.markov_threshold,
        custom_charset_1: attack.custom_charset_1,
        custom_charset_2: attack.custom_charset_2,
        custom_charset_3: attack.custom_charset_3,
        custom_charset_4: attack.custom_charset_4,
        left_rule: attack.left_rule,
        right_rule: attack.right_rule,
        complexity_value: attack.complexity_value,
        word_list,
        rule_list,
        mask_list,
        current_eta: eta.current_eta,
        total_eta: eta.total_eta,
    }))
}

/// GET /attacks/{id}/hash_list — stream the uncracked hashes as text/plain.
pub async fn get_hash_list(
    State(state): State<AppState>,
    Extension(AuthedAgent(agent)): Extension<AuthedAgent>,
    Path(id): Path<i64>,
) -> ApiResult<Response> {
    let campaign = state.attacks.campaign_of(id).await?;
    let project_ids = state.agents.project_ids(agent.id).await?;
    if !project_ids.contains(&campaign.project_id) {
        return Err(ApiError(CoreError::NotFound {
            entity: "attack",
            id,
        }));
    }

    let hash_lists = state.hash_lists.clone();
    let hash_list_id = campaign.hash_list_id;
    let stream = futures::stream::try_unfold(0_i64, move |after_id| {
        let hash_lists = hash_lists.clone();
        async move {
            let page = hash_lists
                .uncracked_page(hash_list_id, after_id, LIST_PAGE_SIZE)
                .await?;
            let Some(&(last_id, _)) = page.last() else {
                return Ok::<_, CoreError>(None);
            };
            let mut chunk = String::with_capacity(page.len() * 34);
            for (_, hash) in &page {
                chunk.push_str(hash);
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
