//! Moka-backed caches for derived data.
//!
//! The store stays the source of truth; these caches hold ephemeral derived
//! values under TTL, and writers invalidate by key.

use std::sync::Arc;
use std::time::Duration;

use moka::future::Cache;

/// Default TTL for the per-agent allowed-hash-type set.
const CAPABILITY_CACHE_TTL_SECS: u64 = 3600;

/// Maximum cached agents.
const CAPABILITY_CACHE_MAX_CAPACITY: u64 = 10_000;

/// Per-agent cache of the hash types the agent has benchmarked.
///
/// Benchmark replacement invalidates the owning agent's entry.
pub struct AgentCapabilityCache {
    hash_types: Cache<i64, Arc<Vec<u32>>>,
}

impl Default for AgentCapabilityCache {
    fn default() -> Self {
        Self::new()
    }
}

impl AgentCapabilityCache {
    pub fn new() -> Self {
        Self::with_ttl(Duration::from_secs(CAPABILITY_CACHE_TTL_SECS))
    }

    pub fn with_ttl(ttl: Duration) -> Self {
        let hash_types = Cache::builder()
            .max_capacity(CAPABILITY_CACHE_MAX_CAPACITY)
            .time_to_live(ttl)
            .build();
        Self { hash_types }
    }

    pub async fn get(&self, agent_id: i64) -> Option<Arc<Vec<u32>>> {
        self.hash_types.get(&agent_id).await
    }

    pub async fn insert(&self, agent_id: i64, types: Vec<u32>) {
        self.hash_types.insert(agent_id, Arc::new(types)).await;
    }

    /// Drop the cached set for one agent.
    pub async fn invalidate(&self, agent_id: i64) {
        self.hash_types.invalidate(&agent_id).await;
    }

    /// Round-trip probe for the health service.
    pub async fn probe(&self) -> bool {
        self.hash_types.insert(-1, Arc::new(vec![0])).await;
        let ok = self.hash_types.get(&-1).await.is_some();
        self.hash_types.invalidate(&-1).await;
        ok
    }
}
