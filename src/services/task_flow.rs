//! Task lifecycle flows driven by the agent wire contract: accept,
//! exhausted, abandon, and zap downloads.

use std::sync::Arc;

use tracing::{info, instrument};

use crate::domain::errors::{CoreError, CoreResult};
use crate::domain::models::{AttackEvent, Campaign, CampaignEvent, Task, TaskEvent};
use crate::domain::ports::{AttackRepository, CampaignRepository, TaskRepository};

pub struct TaskFlowService {
    tasks: Arc<dyn TaskRepository>,
    attacks: Arc<dyn AttackRepository>,
    campaigns: Arc<dyn CampaignRepository>,
}

impl TaskFlowService {
    pub fn new(
        tasks: Arc<dyn TaskRepository>,
        attacks: Arc<dyn AttackRepository>,
        campaigns: Arc<dyn CampaignRepository>,
    ) -> Self {
        Self {
            tasks,
            attacks,
            campaigns,
        }
    }

    /// Fetch a task, enforcing agent ownership.
    pub async fn get_owned(&self, agent_id: i64, task_id: i64) -> CoreResult<Task> {
        let task = self.tasks.get(task_id).await?;
        if task.agent_id != agent_id {
            return Err(CoreError::AuthFailure);
        }
        Ok(task)
    }

    /// Agent accepts the task; its attack starts running.
    #[instrument(skip(self), err)]
    pub async fn accept(&self, agent_id: i64, task_id: i64) -> CoreResult<Task> {
        self.tasks.accept(task_id, agent_id).await
    }

    /// Agent reports the keyspace exhausted. The attack follows the task and
    /// the campaign closes when every attack is terminal.
    #[instrument(skip(self), err)]
    pub async fn exhaust(&self, agent_id: i64, task_id: i64) -> CoreResult<Task> {
        let task = self.get_owned(agent_id, task_id).await?;
        let task = self.tasks.apply_event(task.id, TaskEvent::Exhaust).await?;

        self.attacks
            .apply_event(task.attack_id, AttackEvent::Exhaust)
            .await?;
        let campaign = self.attacks.campaign_of(task.attack_id).await?;
        self.maybe_complete_campaign(&campaign).await?;

        info!(task_id = task.id, attack_id = task.attack_id, "attack exhausted");
        Ok(task)
    }

    /// Agent hands the task back to the queue.
    #[instrument(skip(self), err)]
    pub async fn abandon(&self, agent_id: i64, task_id: i64) -> CoreResult<Task> {
        let task = self.get_owned(agent_id, task_id).await?;
        self.tasks.apply_event(task.id, TaskEvent::Abandon).await
    }

    /// The agent pulled the zap list; its task is no longer stale.
    pub async fn zaps_downloaded(&self, task_id: i64) -> CoreResult<()> {
        self.tasks.clear_stale_on_zap_download(task_id).await
    }

    async fn maybe_complete_campaign(&self, campaign: &Campaign) -> CoreResult<()> {
        if self.campaigns.all_attacks_terminal(campaign.id).await? {
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
        Ok(())
    }
}
