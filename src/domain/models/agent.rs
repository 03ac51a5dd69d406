//! Agent domain model.
//!
//! Agents are remote worker nodes. They authenticate with a bearer token of
//! shape `csa_<agent_id>_<opaque>` and only become `active` once they have
//! submitted at least one benchmark.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::errors::CoreError;

/// State of an agent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentState {
    /// Registered but not yet eligible for work (no benchmarks)
    Pending,
    /// Benchmarked and eligible for task assignment
    Active,
    /// Shut down by the agent itself
    Stopped,
    /// No heartbeat within the offline window
    Offline,
    /// A fatal error was reported
    Error,
}

impl Default for AgentState {
    fn default() -> Self {
        Self::Pending
    }
}

/// Named events that drive agent transitions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentEvent {
    /// A valid heartbeat arrived
    Heartbeat,
    /// A non-empty benchmark set was recorded
    BenchmarkSubmitted,
    /// The agent requested a terminal shutdown
    Shutdown,
    /// The maintenance loop saw no heartbeat within the offline window
    MarkOffline,
    /// A fatal error was ingested
    MarkError,
}

impl AgentEvent {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Heartbeat => "heartbeat",
            Self::BenchmarkSubmitted => "benchmark_submitted",
            Self::Shutdown => "shutdown",
            Self::MarkOffline => "mark_offline",
            Self::MarkError => "mark_error",
        }
    }
}

impl AgentState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Active => "active",
            Self::Stopped => "stopped",
            Self::Offline => "offline",
            Self::Error => "error",
        }
    }

    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "pending" => Some(Self::Pending),
            "active" => Some(Self::Active),
            "stopped" => Some(Self::Stopped),
            "offline" => Some(Self::Offline),
            "error" => Some(Self::Error),
            _ => None,
        }
    }

    /// Apply a named event.
    ///
    /// `Heartbeat` recovers `offline`/`error` agents back to `pending`; on
    /// other states it is an idempotent no-op. `BenchmarkSubmitted` promotes
    /// `pending` to `active`.
    pub fn apply(&self, event: AgentEvent) -> Result<AgentState, CoreError> {
        use AgentEvent as E;
        use AgentState as S;

        let next = match (self, event) {
            (S::Offline | S::Error, E::Heartbeat) => S::Pending,
            (S::Pending | S::Active | S::Stopped, E::Heartbeat) => *self,
            (S::Pending | S::Active, E::BenchmarkSubmitted) => S::Active,
            (_, E::Shutdown) => S::Stopped,
            (S::Active | S::Pending | S::Offline, E::MarkOffline) => S::Offline,
            (_, E::MarkError) => S::Error,
            (from, event) => {
                return Err(CoreError::InvalidTransition {
                    entity: "agent",
                    from: from.as_str(),
                    event: event.as_str(),
                })
            }
        };
        Ok(next)
    }
}

/// A worker node in the fleet.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Agent {
    pub id: i64,
    pub name: String,
    /// Bearer token, shape `csa_<agent_id>_<opaque>`
    #[serde(skip_serializing)]
    pub token: String,
    pub state: AgentState,
    pub client_signature: Option<String>,
    pub operating_system: Option<String>,
    /// Device names as reported by the agent
    pub devices: Vec<String>,
    pub last_seen_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Agent {
    /// Parse the agent id out of a `csa_<agent_id>_<opaque>` bearer token.
    pub fn id_from_token(token: &str) -> Option<i64> {
        let rest = token.strip_prefix("csa_")?;
        let (id, opaque) = rest.split_once('_')?;
        if opaque.is_empty() {
            return None;
        }
        id.parse().ok()
    }
}

/// Measured guess rate for one agent x device x hash mode.
///
/// The set of benchmarks for an agent is replaced atomically on each
/// submission.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HashcatBenchmark {
    pub id: i64,
    pub agent_id: i64,
    pub device: u32,
    pub hash_type: u32,
    /// Hashes per second
    pub hash_speed: f64,
    pub runtime_ms: i64,
    pub created_at: DateTime<Utc>,
}
