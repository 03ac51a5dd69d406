//! Crack submission service.
//!
//! Applies a cracked hash to its hash list, propagates the plaintext to
//! duplicate hashes across lists of the same hash type, and flags every
//! other affected task stale, all in one transaction.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{info, instrument};

use crate::domain::errors::{CoreError, CoreResult};
use crate::domain::models::{CampaignEvent, TaskEvent};
use crate::domain::ports::{
    AttackRepository, CampaignRepository, CrackApplication, HashListRepository, TaskRepository,
};

/// A crack as submitted over the wire.
#[derive(Debug, Clone)]
pub struct CrackSubmission {
    pub hash_value: String,
    pub plain_text: String,
    pub timestamp: DateTime<Utc>,
}

/// What the handler should tell the agent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CrackResult {
    /// The task's hash list ran dry; task completed
    TaskCompleted,
    /// Crack applied (or already known); keep cracking
    Accepted { uncracked_remaining: i64 },
}

pub struct CrackService {
    tasks: Arc<dyn TaskRepository>,
    attacks: Arc<dyn AttackRepository>,
    campaigns: Arc<dyn CampaignRepository>,
    hash_lists: Arc<dyn HashListRepository>,
    propagate_within_project_only: bool,
}

impl CrackService {
    pub fn new(
        tasks: Arc<dyn TaskRepository>,
        attacks: Arc<dyn AttackRepository>,
        campaigns: Arc<dyn CampaignRepository>,
        hash_lists: Arc<dyn HashListRepository>,
        propagate_within_project_only: bool,
    ) -> Self {
        Self {
            tasks,
            attacks,
            campaigns,
            hash_lists,
            propagate_within_project_only,
        }
    }

    /// Apply one cracked hash submitted by the owning agent.
    ///
    /// At-most-once per `(hash_list, hash_value)`: re-submitting an already
    /// cracked hash succeeds without overwriting anything.
    #[instrument(skip(self, submission), fields(task_id), err)]
    pub async fn submit_crack(
        &self,
        agent_id: i64,
        task_id: i64,
        submission: &CrackSubmission,
    ) -> CoreResult<CrackResult> {
        if submission.hash_value.trim().is_empty() {
            return Err(CoreError::Validation("hash must not be empty".into()));
        }
        if submission.plain_text.is_empty() {
            return Err(CoreError::Validation("plain_text must not be empty".into()));
        }
        if submission.timestamp > Utc::now() + chrono::Duration::minutes(5) {
            return Err(CoreError::Validation("timestamp is in the future".into()));
        }

        let task = self.tasks.get(task_id).await?;
        if task.agent_id != agent_id {
            return Err(CoreError::AuthFailure);
        }
        // Validates the event is allowed in the task's current state.
        task.state.apply(TaskEvent::AcceptCrack)?;

        let campaign = self.attacks.campaign_of(task.attack_id).await?;
        let hash_list = self.hash_lists.get(campaign.hash_list_id).await?;

        let outcome = self
            .hash_lists
            .apply_crack(&CrackApplication {
                task_id: task.id,
                attack_id: task.attack_id,
                hash_list_id: hash_list.id,
                hash_type_id: hash_list.hash_type_id,
                project_id: campaign.project_id,
                hash_value: submission.hash_value.clone(),
                plain_text: submission.plain_text.clone(),
                timestamp: submission.timestamp,
                propagate_within_project_only: self.propagate_within_project_only,
            })
            .await?;

        let prefix_len = submission.hash_value.len().min(8);
        info!(
            task_id = task.id,
            hash_prefix = &submission.hash_value[..prefix_len],
            newly_cracked = outcome.newly_cracked,
            propagated = outcome.propagated,
            stale_marked = outcome.stale_marked,
            remaining = outcome.uncracked_remaining,
            "crack applied"
        );

        if outcome.task_completed
            && self.campaigns.all_attacks_terminal(campaign.id).await?
        {
            // Idempotent; a concurrent submission may have closed it already.
            if let Err(err) = self
                .campaigns
                .apply_event(campaign.id, CampaignEvent::Complete)
                .await
            {
                if !err.is_retryable() {
                    return Err(err);
                }
            }
        }

        Ok(if outcome.task_completed {
            CrackResult::TaskCompleted
        } else {
            CrackResult::Accepted {
                uncracked_remaining: outcome.uncracked_remaining,
            }
        })
    }
}
