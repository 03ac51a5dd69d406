//! Task domain model.
//!
//! A task is a unit of work handed to exactly one agent for one attack.
//! The agent assignment is exclusive for the task's lifetime.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::errors::CoreError;

/// State of a task in the cracking pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskState {
    /// Task is created or returned to the queue, waiting for its agent
    Pending,
    /// Agent accepted the task and is cracking
    Running,
    /// All hashes assigned to the attack were cracked
    Completed,
    /// The attack keyspace was exhausted without cracking everything
    Exhausted,
    /// Task failed or was rejected
    Failed,
}

impl Default for TaskState {
    fn default() -> Self {
        Self::Pending
    }
}

/// Named events that drive task transitions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskEvent {
    /// Agent accepts the task
    Accept,
    /// Agent submitted a status snapshot
    AcceptStatus,
    /// Agent submitted a cracked hash
    AcceptCrack,
    /// Every hash assigned to the attack is cracked
    Complete,
    /// Agent reports the keyspace exhausted
    Exhaust,
    /// Execution failed
    Fail,
    /// Agent gives the task back
    Abandon,
    /// Task rejected before it ever ran
    Reject,
    /// A failed task is handed back to its agent for another attempt
    Retry,
}

impl TaskEvent {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Accept => "accept",
            Self::AcceptStatus => "accept_status",
            Self::AcceptCrack => "accept_crack",
            Self::Complete => "complete",
            Self::Exhaust => "exhaust",
            Self::Fail => "fail",
            Self::Abandon => "abandon",
            Self::Reject => "reject",
            Self::Retry => "retry",
        }
    }
}

impl TaskState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Exhausted => "exhausted",
            Self::Failed => "failed",
        }
    }

    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "pending" => Some(Self::Pending),
            "running" => Some(Self::Running),
            "completed" | "complete" => Some(Self::Completed),
            "exhausted" => Some(Self::Exhausted),
            "failed" => Some(Self::Failed),
            _ => None,
        }
    }

    /// Check if this is a terminal state.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Exhausted)
    }

    /// Pending or running, i.e. the task still holds its agent exclusively.
    pub fn is_incomplete(&self) -> bool {
        matches!(self, Self::Pending | Self::Running)
    }

    /// Apply a named event. Unlisted events fail with `InvalidTransition`.
    ///
    /// Transitions are idempotent for the current state: a second `Accept`
    /// on a running task yields `Running` again and is a no-op success.
    pub fn apply(&self, event: TaskEvent) -> Result<TaskState, CoreError> {
        use TaskEvent as E;
        use TaskState as S;

        let next = match (self, event) {
            (S::Pending | S::Running, E::Accept) => S::Running,
            (S::Running, E::AcceptStatus | E::AcceptCrack) => S::Running,
            (S::Running | S::Completed, E::Complete) => S::Completed,
            (S::Running | S::Exhausted, E::Exhaust) => S::Exhausted,
            (S::Running | S::Failed, E::Fail) => S::Failed,
            (S::Running | S::Pending, E::Abandon) => S::Pending,
            (S::Pending | S::Failed, E::Reject) => S::Failed,
            (S::Failed | S::Pending, E::Retry) => S::Pending,
            (from, event) => {
                return Err(CoreError::InvalidTransition {
                    entity: "task",
                    from: from.as_str(),
                    event: event.as_str(),
                })
            }
        };
        Ok(next)
    }
}

/// A unit of work handed to one agent for one attack.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    /// Unique identifier
    pub id: i64,
    /// Attack this task executes
    pub attack_id: i64,
    /// Owning agent; exclusive for the task's lifetime
    pub agent_id: i64,
    /// Current state
    pub state: TaskState,
    /// Set when external facts (zaps, preemption) invalidated the task
    pub stale: bool,
    /// Last time the agent reported anything for this task
    pub activity_timestamp: Option<DateTime<Utc>>,
    /// When the task was handed to the agent
    pub start_date: DateTime<Utc>,
    /// How many times the task was preempted back to pending
    pub preemption_count: u32,
    /// Progress from the most recent status snapshot, 0.0..=100.0
    pub progress_percent: f64,
    /// When created
    pub created_at: DateTime<Utc>,
    /// When last updated
    pub updated_at: DateTime<Utc>,
}

impl Task {
    /// Create a fresh pending task for an agent on an attack.
    pub fn new(attack_id: i64, agent_id: i64) -> Self {
        let now = Utc::now();
        Self {
            id: 0,
            attack_id,
            agent_id,
            state: TaskState::default(),
            stale: false,
            activity_timestamp: None,
            start_date: now,
            preemption_count: 0,
            progress_percent: 0.0,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.state.is_terminal()
    }

    /// Apply a named event, updating state and timestamps on success.
    ///
    /// Returns `true` when the state actually changed, `false` for an
    /// idempotent no-op.
    pub fn apply_event(&mut self, event: TaskEvent) -> Result<bool, CoreError> {
        let next = self.state.apply(event)?;
        if next == self.state && !matches!(event, TaskEvent::AcceptStatus | TaskEvent::AcceptCrack)
        {
            return Ok(false);
        }
        let changed = next != self.state;
        self.state = next;
        self.updated_at = Utc::now();
        if matches!(event, TaskEvent::Accept) && self.activity_timestamp.is_none() {
            self.activity_timestamp = Some(Utc::now());
        }
        Ok(changed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accept_moves_pending_to_running() {
        let mut task = Task::new(1, 1);
        assert!(task.apply_event(TaskEvent::Accept).unwrap());
        assert_eq!(task.state, TaskState::Running);
        assert!(task.activity_timestamp.is_some());
    }

    #[test]
    fn accept_is_idempotent_on_running() {
        let mut task = Task::new(1, 1);
        task.apply_event(TaskEvent::Accept).unwrap();
        // Second accept is a no-op success
        assert!(!task.apply_event(TaskEvent::Accept).unwrap());
        assert_eq!(task.state, TaskState::Running);
    }

    #[test]
    fn abandon_returns_running_to_pending() {
        let mut task = Task::new(1, 1);
        task.apply_event(TaskEvent::Accept).unwrap();
        assert!(task.apply_event(TaskEvent::Abandon).unwrap());
        assert_eq!(task.state, TaskState::Pending);
    }

    #[test]
    fn reject_fails_a_pending_task() {
        let mut task = Task::new(1, 1);
        assert!(task.apply_event(TaskEvent::Reject).unwrap());
        assert_eq!(task.state, TaskState::Failed);
    }

    #[test]
    fn terminal_states_refuse_further_events() {
        let mut task = Task::new(1, 1);
        task.apply_event(TaskEvent::Accept).unwrap();
        task.apply_event(TaskEvent::Complete).unwrap();
        assert!(task.is_terminal());

        let err = task.state.apply(TaskEvent::Accept).unwrap_err();
        assert!(matches!(err, CoreError::InvalidTransition { entity: "task", .. }));
        assert!(task.state.apply(TaskEvent::Abandon).is_err());
        // Re-completing stays a no-op success
        assert_eq!(task.state.apply(TaskEvent::Complete).unwrap(), TaskState::Completed);
    }

    #[test]
    fn status_events_only_valid_while_running() {
        let task = Task::new(1, 1);
        assert!(task.state.apply(TaskEvent::AcceptStatus).is_err());
        assert!(task.state.apply(TaskEvent::AcceptCrack).is_err());

        let mut task = Task::new(1, 1);
        task.apply_event(TaskEvent::Accept).unwrap();
        assert_eq!(task.state.apply(TaskEvent::AcceptStatus).unwrap(), TaskState::Running);
        assert_eq!(task.state.apply(TaskEvent::AcceptCrack).unwrap(), TaskState::Running);
    }

    #[test]
    fn exhaust_and_fail_from_running() {
        let mut t = Task::new(1, 1);
        t.apply_event(TaskEvent::Accept).unwrap();
        t.apply_event(TaskEvent::Exhaust).unwrap();
        assert_eq!(t.state, TaskState::Exhausted);
        assert!(t.is_terminal());

        let mut t = Task::new(1, 1);
        t.apply_event(TaskEvent::Accept).unwrap();
        t.apply_event(TaskEvent::Fail).unwrap();
        assert_eq!(t.state, TaskState::Failed);
        // Failed is not terminal: the task may be retried by its agent
        assert!(!t.is_terminal());
    }

    #[test]
    fn retry_returns_failed_to_pending() {
        let mut task = Task::new(1, 1);
        task.apply_event(TaskEvent::Accept).unwrap();
        task.apply_event(TaskEvent::Fail).unwrap();
        assert!(task.apply_event(TaskEvent::Retry).unwrap());
        assert_eq!(task.state, TaskState::Pending);
    }

    #[test]
    fn state_round_trips_through_strings() {
        for state in [
            TaskState::Pending,
            TaskState::Running,
            TaskState::Completed,
            TaskState::Exhausted,
            TaskState::Failed,
        ] {
            assert_eq!(TaskState::from_str(state.as_str()), Some(state));
        }
        assert_eq!(TaskState::from_str("bogus"), None);
    }
}
