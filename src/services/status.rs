//! Status submission service.
//!
//! Ingests status snapshots, keeps the task's activity timestamp fresh, and
//! tells the agent whether to continue, re-fetch zaps, or back off.

use std::sync::Arc;

use tracing::{debug, instrument};

use crate::domain::errors::{CoreError, CoreResult};
use crate::domain::models::{AttackState, HashcatStatus, TaskEvent, TaskState};
use crate::domain::ports::{AttackRepository, StatusRepository, TaskRepository};

/// Response classification surfaced to the agent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusAck {
    /// Continue work
    Ok,
    /// Task is stale; re-fetch zaps and continue
    Stale,
    /// Task or attack paused; back off
    Paused,
}

pub struct StatusService {
    tasks: Arc<dyn TaskRepository>,
    attacks: Arc<dyn AttackRepository>,
    statuses: Arc<dyn StatusRepository>,
}

impl StatusService {
    pub fn new(
        tasks: Arc<dyn TaskRepository>,
        attacks: Arc<dyn AttackRepository>,
        statuses: Arc<dyn StatusRepository>,
    ) -> Self {
        Self {
            tasks,
            attacks,
            statuses,
        }
    }

    /// Ingest one status snapshot for a task owned by the agent.
    ///
    /// The snapshot must carry a guess block and at least one device reading;
    /// the handler rejects bodies missing either before this point, and the
    /// empty-device case is re-checked here.
    #[instrument(skip(self, status), fields(task_id), err)]
    pub async fn submit_status(
        &self,
        agent_id: i64,
        task_id: i64,
        status: HashcatStatus,
    ) -> CoreResult<StatusAck> {
        if status.devices.is_empty() {
            return Err(CoreError::Validation(
                "status must include at least one device".into(),
            ));
        }

        let task = self.tasks.get(task_id).await?;
        if task.agent_id != agent_id {
            return Err(CoreError::AuthFailure);
        }

        // A preempted (pending) task or a paused attack means back off; the
        // snapshot is not recorded against work the agent should stop.
        let attack = self.attacks.get(task.attack_id).await?;
        if task.state == TaskState::Pending && task.preemption_count > 0
            || attack.state == AttackState::Paused
        {
            debug!(task_id = task.id, "status for paused/preempted work");
            return Ok(StatusAck::Paused);
        }

        // Rejects snapshots against terminal or never-accepted tasks.
        task.state.apply(TaskEvent::AcceptStatus)?;

        self.statuses.insert(&status).await?;

        if task.stale {
            return Ok(StatusAck::Stale);
        }
        Ok(StatusAck::Ok)
    }
}
