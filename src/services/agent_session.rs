//! Agent session service: heartbeat, benchmark replacement, error ingest,
//! profile updates, shutdown, and cracker update queries.

use std::sync::Arc;

use tracing::{info, instrument};

use crate::domain::errors::{CoreError, CoreResult};
use crate::domain::models::{AgentEvent, AgentState, Severity};
use crate::domain::ports::{
    AgentErrorRepository, AgentProfile, AgentRepository, CrackerRepository, NewBenchmark,
    TaskRepository,
};
use crate::infrastructure::cache::AgentCapabilityCache;

/// Answer to a cracker update query.
#[derive(Debug, Clone, PartialEq)]
pub struct CrackerUpdate {
    pub available: bool,
    pub latest_version: Option<String>,
    pub download_url: Option<String>,
    pub exec_name: Option<String>,
    pub message: String,
}

pub struct AgentSessionService {
    agents: Arc<dyn AgentRepository>,
    tasks: Arc<dyn TaskRepository>,
    errors: Arc<dyn AgentErrorRepository>,
    crackers: Arc<dyn CrackerRepository>,
    capabilities: Arc<AgentCapabilityCache>,
}

impl AgentSessionService {
    pub fn new(
        agents: Arc<dyn AgentRepository>,
        tasks: Arc<dyn TaskRepository>,
        errors: Arc<dyn AgentErrorRepository>,
        crackers: Arc<dyn CrackerRepository>,
        capabilities: Arc<AgentCapabilityCache>,
    ) -> Self {
        Self {
            agents,
            tasks,
            errors,
            crackers,
            capabilities,
        }
    }

    /// Record liveness. Offline and errored agents recover to pending, and a
    /// pending agent that already holds benchmarks is promoted straight back
    /// to active.
    #[instrument(skip(self), err)]
    pub async fn heartbeat(&self, agent_id: i64) -> CoreResult<AgentState> {
        self.agents.touch_last_seen(agent_id).await?;
        let mut state = self.agents.apply_event(agent_id, AgentEvent::Heartbeat).await?;

        if state == AgentState::Pending
            && !self.agents.benchmarked_hash_types(agent_id).await?.is_empty()
        {
            state = self
                .agents
                .apply_event(agent_id, AgentEvent::BenchmarkSubmitted)
                .await?;
        }
        Ok(state)
    }

    /// Atomically replace the agent's benchmark set and promote it to active.
    #[instrument(skip(self, benchmarks), fields(count = benchmarks.len()), err)]
    pub async fn submit_benchmarks(
        &self,
        agent_id: i64,
        benchmarks: &[NewBenchmark],
    ) -> CoreResult<AgentState> {
        if benchmarks.is_empty() {
            return Err(CoreError::Validation(
                "hashcat_benchmarks must not be empty".into(),
            ));
        }
        for b in benchmarks {
            if b.hash_speed <= 0.0 {
                return Err(CoreError::Validation(format!(
                    "hash_speed must be positive for hash type {}",
                    b.hash_type
                )));
            }
        }

        self.agents.replace_benchmarks(agent_id, benchmarks).await?;
        self.capabilities.invalidate(agent_id).await;
        let state = self
            .agents
            .apply_event(agent_id, AgentEvent::BenchmarkSubmitted)
            .await?;
        info!(agent_id, benchmarks = benchmarks.len(), "benchmark set replaced");
        Ok(state)
    }

    /// Record a severity-tagged error, optionally linked to one of the
    /// agent's own tasks. Fatal errors move the agent to the error state.
    #[instrument(skip(self, message, metadata), err)]
    pub async fn submit_error(
        &self,
        agent_id: i64,
        task_id: Option<i64>,
        severity: Severity,
        message: &str,
        metadata: Option<&serde_json::Value>,
    ) -> CoreResult<()> {
        if message.trim().is_empty() {
            return Err(CoreError::Validation("message must not be empty".into()));
        }
        if let Some(task_id) = task_id {
            let task = self.tasks.get(task_id).await?;
            if task.agent_id != agent_id {
                return Err(CoreError::Validation(
                    "task does not belong to this agent".into(),
                ));
            }
        }

        self.errors
            .insert(agent_id, task_id, severity, message, metadata)
            .await?;

        if severity.is_fatal() {
            self.agents.apply_event(agent_id, AgentEvent::MarkError).await?;
        }
        Ok(())
    }

    /// Terminal shutdown requested by the agent.
    #[instrument(skip(self), err)]
    pub async fn shutdown(&self, agent_id: i64) -> CoreResult<AgentState> {
        self.agents.apply_event(agent_id, AgentEvent::Shutdown).await
    }

    pub async fn update_profile(&self, agent_id: i64, profile: &AgentProfile) -> CoreResult<()> {
        self.agents.update_profile(agent_id, profile).await
    }

    /// Whether a newer cracker binary is published for the agent's OS.
    #[instrument(skip(self), err)]
    pub async fn check_cracker_update(
        &self,
        current_version: &str,
        operating_system: &str,
    ) -> CoreResult<CrackerUpdate> {
        let Some(latest) = self.crackers.latest_for_os(operating_system).await? else {
            return Ok(CrackerUpdate {
                available: false,
                latest_version: None,
                download_url: None,
                exec_name: None,
                message: format!("no cracker published for {operating_system}"),
            });
        };

        if version_newer(&latest.version, current_version) {
            Ok(CrackerUpdate {
                available: true,
                latest_version: Some(latest.version),
                download_url: Some(latest.download_url),
                exec_name: Some(latest.exec_name),
                message: "update available".into(),
            })
        } else {
            Ok(CrackerUpdate {
                available: false,
                latest_version: Some(latest.version),
                download_url: None,
                exec_name: None,
                message: "cracker is current".into(),
            })
        }
    }
}

/// Dotted-numeric version comparison; non-numeric segments compare as zero.
fn version_newer(candidate: &str, current: &str) -> bool {
    let parse = |v: &str| -> Vec<u64> {
        v.trim_start_matches('v')
            .split('.')
            .map(|seg| {
                seg.chars()
                    .take_while(char::is_ascii_digit)
                    .collect::<String>()
                    .parse()
                    .unwrap_or(0)
            })
            .collect()
    };
    parse(candidate) > parse(current)
}
