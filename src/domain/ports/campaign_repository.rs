//! Campaign and attack repository ports.

use async_trait::async_trait;

use crate::domain::errors::CoreResult;
use crate::domain::models::{
    Attack, AttackEvent, AttackState, Campaign, CampaignEvent, CampaignState, Resource,
};

/// One row of the assignment candidate query: an attack joined with its
/// campaign and hash list, already filtered to what the agent could run.
#[derive(Debug, Clone)]
pub struct CandidateAttack {
    pub attack_id: i64,
    pub campaign_id: i64,
    pub project_id: i64,
    pub hash_list_id: i64,
    /// Stored numeric campaign priority
    pub priority: i64,
    pub hash_mode: u32,
    pub complexity_value: i64,
    pub uncracked_count: i64,
}

#[async_trait]
pub trait CampaignRepository: Send + Sync {
    async fn get(&self, id: i64) -> CoreResult<Campaign>;

    /// Apply a campaign event with a CAS guard, audited.
    async fn apply_event(&self, id: i64, event: CampaignEvent) -> CoreResult<CampaignState>;

    /// Candidate attacks for an agent, per the assignment ordering:
    /// `priority desc, complexity asc, created_at asc`. Only active
    /// campaigns in the agent's projects, only pending/running attacks, only
    /// hash types the agent has benchmarked, only lists with uncracked items.
    async fn candidate_attacks(
        &self,
        project_ids: &[i64],
        hash_types: &[u32],
    ) -> CoreResult<Vec<CandidateAttack>>;

    /// Whether every attack of the campaign is in a terminal state.
    async fn all_attacks_terminal(&self, campaign_id: i64) -> CoreResult<bool>;

    /// `(max(attacks.updated_at), max(tasks.updated_at))` for the campaign,
    /// as stored strings. Any progress change alters the pair, which is what
    /// makes it a natural ETA cache key.
    async fn activity_fingerprint(&self, campaign_id: i64) -> CoreResult<(String, String)>;
}

#[async_trait]
pub trait AttackRepository: Send + Sync {
    async fn get(&self, id: i64) -> CoreResult<Attack>;

    /// The attack's campaign, for project and hash-list context.
    async fn campaign_of(&self, attack_id: i64) -> CoreResult<Campaign>;

    /// Apply an attack event with a CAS guard, audited.
    async fn apply_event(&self, id: i64, event: AttackEvent) -> CoreResult<AttackState>;

    /// Incomplete attacks of priority >= normal whose hash list still has
    /// uncracked items but which have no running task. Rebalancing input.
    async fn starved_attacks(&self) -> CoreResult<Vec<CandidateAttack>>;

    /// Pending and paused attacks of a campaign with their hash modes, for
    /// the total-ETA sum.
    async fn unstarted_for_campaign(&self, campaign_id: i64) -> CoreResult<Vec<(i64, u32, i64)>>;

    async fn resource(&self, id: i64) -> CoreResult<Resource>;
}
