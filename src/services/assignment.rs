//! Task assignment service.
//!
//! Chooses or creates the next task for a requesting agent, in strict
//! priority order, invoking preemption when capacity is exhausted.

use std::collections::HashMap;
use std::sync::Arc;

use serde_json::json;
use tracing::{debug, info, instrument};

use crate::domain::errors::CoreResult;
use crate::domain::models::{
    Agent, AgentState, CampaignPriority, Severity, Task, TaskEvent, TaskState,
};
use crate::domain::ports::{
    AgentErrorRepository, AgentRepository, AttackRepository, CampaignRepository, CandidateAttack,
    HashListRepository, TaskRepository,
};
use crate::infrastructure::cache::AgentCapabilityCache;
use crate::services::preemption::PreemptionService;

pub struct AssignmentService {
    agents: Arc<dyn AgentRepository>,
    tasks: Arc<dyn TaskRepository>,
    campaigns: Arc<dyn CampaignRepository>,
    attacks: Arc<dyn AttackRepository>,
    hash_lists: Arc<dyn HashListRepository>,
    errors: Arc<dyn AgentErrorRepository>,
    capabilities: Arc<AgentCapabilityCache>,
    preemption: Arc<PreemptionService>,
    /// Minimum benchmark speed per hash mode
    benchmark_thresholds: HashMap<u32, f64>,
}

impl AssignmentService {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        agents: Arc<dyn AgentRepository>,
        tasks: Arc<dyn TaskRepository>,
        campaigns: Arc<dyn CampaignRepository>,
        attacks: Arc<dyn AttackRepository>,
        hash_lists: Arc<dyn HashListRepository>,
        errors: Arc<dyn AgentErrorRepository>,
        capabilities: Arc<AgentCapabilityCache>,
        preemption: Arc<PreemptionService>,
        benchmark_thresholds: HashMap<u32, f64>,
    ) -> Self {
        Self {
            agents,
            tasks,
            campaigns,
            attacks,
            hash_lists,
            errors,
            capabilities,
            preemption,
            benchmark_thresholds,
        }
    }

    /// The next task the agent should work on, or `None` for no-content.
    #[instrument(skip(self, agent), fields(agent_id = agent.id), err)]
    pub async fn next_task(&self, agent: &Agent) -> CoreResult<Option<Task>> {
        if agent.state != AgentState::Active {
            debug!(state = agent.state.as_str(), "agent not active, no work");
            return Ok(None);
        }

        // 1. An incomplete task the agent already owns, unless a fatal error
        //    is logged against it or its hash list ran dry. Preempted tasks
        //    (pending and stale) wait for the priority walk below so the
        //    displacing attack gets the agent first.
        for task in self.tasks.incomplete_for_agent(agent.id).await? {
            if task.state == TaskState::Pending && task.stale {
                continue;
            }
            if self.errors.fatal_exists_for_task(task.id).await? {
                continue;
            }
            let campaign = self.attacks.campaign_of(task.attack_id).await?;
            let hash_list = self.hash_lists.get(campaign.hash_list_id).await?;
            if hash_list.uncracked_count > 0 {
                debug!(task_id = task.id, "returning already-assigned task");
                return Ok(Some(task));
            }
        }

        // 2. Candidate attacks in priority order.
        let project_ids = self.agents.project_ids(agent.id).await?;
        if project_ids.is_empty() {
            return Ok(None);
        }
        let hash_types = self.allowed_hash_types(agent.id).await?;
        let candidates = self
            .campaigns
            .candidate_attacks(&project_ids, &hash_types)
            .await?;

        // 3. Retry, resume, or create.
        if let Some(task) = self.try_candidates(agent, &candidates).await? {
            return Ok(Some(task));
        }

        // 4. Nothing available: preempt on behalf of the best non-deferred
        //    candidate, then re-evaluate once.
        if let Some(top) = candidates
            .iter()
            .find(|c| c.priority > CampaignPriority::Deferred.as_i64())
        {
            if self.preemption.preempt_for(top).await? {
                if let Some(task) = self.try_candidates(agent, &candidates).await? {
                    return Ok(Some(task));
                }
            }
        }

        Ok(None)
    }

    /// Walk the ordered candidates: retry a failed task, resume a pending
    /// one, or create a new task when the agent clears the benchmark bar.
    async fn try_candidates(
        &self,
        agent: &Agent,
        candidates: &[CandidateAttack],
    ) -> CoreResult<Option<Task>> {
        for candidate in candidates {
            if candidate.uncracked_count <= 0 {
                continue;
            }

            if let Some(failed) = self
                .tasks
                .failed_for_agent_on_attack(agent.id, candidate.attack_id)
                .await?
            {
                if !self.errors.fatal_exists_for_task(failed.id).await? {
                    let task = self.tasks.apply_event(failed.id, TaskEvent::Retry).await?;
                    info!(task_id = task.id, attack_id = candidate.attack_id, "retrying failed task");
                    return Ok(Some(task));
                }
            }

            if let Some(pending) = self
                .tasks
                .pending_for_agent_on_attack(agent.id, candidate.attack_id)
                .await?
            {
                return Ok(Some(pending));
            }

            if self.meets_threshold(agent.id, candidate.hash_mode).await? {
                let task = Task::new(candidate.attack_id, agent.id);
                let id = self.tasks.insert(&task).await?;
                let task = self.tasks.get(id).await?;
                info!(
                    task_id = id,
                    attack_id = candidate.attack_id,
                    "created task for agent"
                );
                return Ok(Some(task));
            }

            self.errors
                .insert(
                    agent.id,
                    None,
                    Severity::Info,
                    "benchmark below threshold for hash mode",
                    Some(&json!({ "hash_mode": candidate.hash_mode })),
                )
                .await?;
        }
        Ok(None)
    }

    /// Fastest benchmark must exist and clear the configured floor for the
    /// hash mode; modes without a configured floor only need a benchmark.
    async fn meets_threshold(&self, agent_id: i64, hash_mode: u32) -> CoreResult<bool> {
        let Some(fastest) = self.agents.fastest_speed(agent_id, hash_mode).await? else {
            return Ok(false);
        };
        Ok(match self.benchmark_thresholds.get(&hash_mode) {
            Some(min) => fastest >= *min,
            None => true,
        })
    }

    /// Per-agent allowed hash types, cached for an hour and invalidated on
    /// benchmark replacement.
    pub async fn allowed_hash_types(&self, agent_id: i64) -> CoreResult<Vec<u32>> {
        if let Some(cached) = self.capabilities.get(agent_id).await {
            return Ok((*cached).clone());
        }
        let fresh = self.agents.benchmarked_hash_types(agent_id).await?;
        self.capabilities.insert(agent_id, fresh.clone()).await;
        Ok(fresh)
    }
}
