//! Agent repository port.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::domain::errors::CoreResult;
use crate::domain::models::{Agent, AgentEvent, AgentState, HashcatBenchmark};

/// A benchmark row as submitted by an agent, before it has an id.
#[derive(Debug, Clone, PartialEq)]
pub struct NewBenchmark {
    pub device: u32,
    pub hash_type: u32,
    pub hash_speed: f64,
    pub runtime_ms: i64,
}

/// Profile fields an agent may update about itself.
#[derive(Debug, Clone, Default)]
pub struct AgentProfile {
    pub name: Option<String>,
    pub client_signature: Option<String>,
    pub operating_system: Option<String>,
    pub devices: Option<Vec<String>>,
}

#[async_trait]
pub trait AgentRepository: Send + Sync {
    async fn get(&self, id: i64) -> CoreResult<Agent>;

    async fn get_by_token(&self, token: &str) -> CoreResult<Option<Agent>>;

    /// Insert an agent and enroll it in the given projects.
    async fn insert(&self, agent: &Agent, project_ids: &[i64]) -> CoreResult<i64>;

    async fn update_profile(&self, id: i64, profile: &AgentProfile) -> CoreResult<()>;

    /// Apply a state event with a compare-and-swap guard on the prior state,
    /// recording the transition in the audit log.
    async fn apply_event(&self, id: i64, event: AgentEvent) -> CoreResult<AgentState>;

    /// Bump `last_seen_at` without touching state.
    async fn touch_last_seen(&self, id: i64) -> CoreResult<()>;

    /// Projects the agent is enrolled in.
    async fn project_ids(&self, agent_id: i64) -> CoreResult<Vec<i64>>;

    /// Atomically replace the agent's benchmark set.
    async fn replace_benchmarks(&self, agent_id: i64, benchmarks: &[NewBenchmark])
        -> CoreResult<()>;

    async fn benchmarks(&self, agent_id: i64) -> CoreResult<Vec<HashcatBenchmark>>;

    /// Distinct hash types the agent has benchmarked.
    async fn benchmarked_hash_types(&self, agent_id: i64) -> CoreResult<Vec<u32>>;

    /// Fastest benchmark speed of this agent for a hash type.
    async fn fastest_speed(&self, agent_id: i64, hash_type: u32) -> CoreResult<Option<f64>>;

    /// Fastest benchmark speed across the whole fleet for a hash type.
    async fn fleet_fastest_speed(&self, hash_type: u32) -> CoreResult<Option<f64>>;

    async fn count_active(&self) -> CoreResult<i64>;

    /// Transition active/pending agents not seen since `cutoff` to offline.
    /// Returns the ids that transitioned.
    async fn mark_offline_before(&self, cutoff: DateTime<Utc>) -> CoreResult<Vec<i64>>;
}
