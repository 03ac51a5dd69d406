//! Task repository port, including the named state-bypass primitives.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::domain::errors::CoreResult;
use crate::domain::models::{Task, TaskEvent};

/// A preemption candidate joined with its campaign's priority.
#[derive(Debug, Clone)]
pub struct PreemptionCandidate {
    pub task_id: i64,
    pub campaign_priority: i64,
    pub progress_percent: f64,
}

#[async_trait]
pub trait TaskRepository: Send + Sync {
    async fn get(&self, id: i64) -> CoreResult<Task>;

    /// Insert a fresh pending task; returns its id.
    async fn insert(&self, task: &Task) -> CoreResult<i64>;

    /// Pending or running tasks owned by the agent, oldest first.
    async fn incomplete_for_agent(&self, agent_id: i64) -> CoreResult<Vec<Task>>;

    async fn pending_for_agent_on_attack(
        &self,
        agent_id: i64,
        attack_id: i64,
    ) -> CoreResult<Option<Task>>;

    async fn failed_for_agent_on_attack(
        &self,
        agent_id: i64,
        attack_id: i64,
    ) -> CoreResult<Option<Task>>;

    /// Accept a task: CAS `pending -> running` on the task (idempotent when
    /// already running) and `pending -> running` on its attack, in one
    /// transaction, both audited. Losers of the CAS get `Conflict`.
    async fn accept(&self, task_id: i64, agent_id: i64) -> CoreResult<Task>;

    /// Apply a task event with a CAS guard on the prior state, audited.
    async fn apply_event(&self, task_id: i64, event: TaskEvent) -> CoreResult<Task>;

    async fn count_running(&self) -> CoreResult<i64>;

    /// Best preemption candidate in a project strictly below `below_priority`:
    /// running, progress under `max_progress`, preempted fewer than
    /// `starvation_cap` times; ordered by (priority asc, progress asc).
    async fn preemption_candidate(
        &self,
        project_id: i64,
        below_priority: i64,
        max_progress: f64,
        starvation_cap: u32,
    ) -> CoreResult<Option<PreemptionCandidate>>;

    /// Named state-machine bypass: set the task back to pending with
    /// `stale = true` and `preemption_count += 1`, without running transition
    /// callbacks. Guarded on `state = running`; returns false when the guard
    /// missed (task finished or moved concurrently).
    async fn force_set_pending_for_preemption(&self, task_id: i64) -> CoreResult<bool>;

    /// Named state-machine bypass: clear the stale flag after the agent
    /// downloaded the zap list.
    async fn clear_stale_on_zap_download(&self, task_id: i64) -> CoreResult<()>;

    /// Delete running tasks whose activity timestamp predates `cutoff`.
    /// Returns `(task_id, attack_id)` pairs so attacks can be re-evaluated.
    async fn delete_abandoned_before(&self, cutoff: DateTime<Utc>)
        -> CoreResult<Vec<(i64, i64)>>;

    async fn running_exists_for_attack(&self, attack_id: i64) -> CoreResult<bool>;

    /// Latest `estimated_stop` across running tasks of running attacks in a
    /// campaign.
    async fn max_estimated_stop_for_campaign(
        &self,
        campaign_id: i64,
    ) -> CoreResult<Option<DateTime<Utc>>>;
}
