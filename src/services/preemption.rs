//! Preemption service.
//!
//! Frees capacity for higher-priority attacks by returning one running,
//! lower-priority task of the same project to pending. Never crosses
//! projects, never cascades, and leaves the system unchanged on any failure.

use std::sync::Arc;

use tracing::{info, instrument, warn};

use crate::domain::errors::CoreResult;
use crate::domain::models::config::PreemptionConfig;
use crate::domain::models::CampaignPriority;
use crate::domain::ports::{AgentRepository, CandidateAttack, TaskRepository};

pub struct PreemptionService {
    agents: Arc<dyn AgentRepository>,
    tasks: Arc<dyn TaskRepository>,
    config: PreemptionConfig,
}

impl PreemptionService {
    pub fn new(
        agents: Arc<dyn AgentRepository>,
        tasks: Arc<dyn TaskRepository>,
        config: PreemptionConfig,
    ) -> Self {
        Self {
            agents,
            tasks,
            config,
        }
    }

    /// Try to free capacity for the requesting attack.
    ///
    /// Admission: only when every active agent already has a running task
    /// (`active_agent_count <= running_task_count`). One task at most is
    /// preempted per invocation. Returns whether a task was preempted.
    #[instrument(skip(self, requesting), fields(attack_id = requesting.attack_id), err)]
    pub async fn preempt_for(&self, requesting: &CandidateAttack) -> CoreResult<bool> {
        if requesting.priority <= CampaignPriority::Deferred.as_i64() {
            return Ok(false);
        }

        let active_agents = self.agents.count_active().await?;
        let running_tasks = self.tasks.count_running().await?;
        if active_agents > running_tasks {
            // Capacity is not exhausted; new work can start without displacing anyone.
            return Ok(false);
        }

        let Some(candidate) = self
            .tasks
            .preemption_candidate(
                requesting.project_id,
                requesting.priority,
                self.config.max_progress_percent,
                self.config.starvation_cap,
            )
            .await?
        else {
            return Ok(false);
        };

        let preempted = self
            .tasks
            .force_set_pending_for_preemption(candidate.task_id)
            .await?;
        if preempted {
            info!(
                task_id = candidate.task_id,
                victim_priority = candidate.campaign_priority,
                victim_progress = candidate.progress_percent,
                for_attack = requesting.attack_id,
                "preempted running task"
            );
        } else {
            warn!(
                task_id = candidate.task_id,
                "preemption lost the race; task no longer running"
            );
        }
        Ok(preempted)
    }
}
