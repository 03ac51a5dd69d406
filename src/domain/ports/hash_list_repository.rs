//! Hash list repository port, including the crack-application primitive.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::domain::errors::CoreResult;
use crate::domain::models::{HashItem, HashList};

/// Everything the crack transaction needs, resolved up front by the service.
#[derive(Debug, Clone)]
pub struct CrackApplication {
    pub task_id: i64,
    pub attack_id: i64,
    pub hash_list_id: i64,
    pub hash_type_id: u32,
    pub project_id: i64,
    pub hash_value: String,
    pub plain_text: String,
    pub timestamp: DateTime<Utc>,
    /// When set, propagation only reaches hash lists of the same project
    pub propagate_within_project_only: bool,
}

/// Facts established by the crack transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CrackOutcome {
    /// False when the hash was already cracked (idempotent success)
    pub newly_cracked: bool,
    /// Duplicate items updated across other hash lists of the same type
    pub propagated: u64,
    /// Other incomplete tasks flagged stale
    pub stale_marked: u64,
    /// Items still uncracked in the submitting task's hash list
    pub uncracked_remaining: i64,
    /// True when the submitting task moved `running -> completed` in-tx
    pub task_completed: bool,
}

#[async_trait]
pub trait HashListRepository: Send + Sync {
    async fn get(&self, id: i64) -> CoreResult<HashList>;

    async fn find_item(&self, hash_list_id: i64, hash_value: &str)
        -> CoreResult<Option<HashItem>>;

    /// The whole crack procedure, item lookup included, in one immediate transaction: update the
    /// item, propagate to duplicates of the same hash type, mark other tasks
    /// stale, refresh uncracked counters, and complete the submitting task
    /// when its hash list ran dry. Already-cracked items short-circuit to an
    /// idempotent success. Any conflict rolls the whole submission back.
    async fn apply_crack(&self, req: &CrackApplication) -> CoreResult<CrackOutcome>;

    /// A page of uncracked hash values, ordered by item id.
    async fn uncracked_page(
        &self,
        hash_list_id: i64,
        after_id: i64,
        limit: i64,
    ) -> CoreResult<Vec<(i64, String)>>;

    /// A page of cracked-list lines (`hash:plain`), ordered by item id.
    async fn cracked_page(
        &self,
        hash_list_id: i64,
        after_id: i64,
        limit: i64,
    ) -> CoreResult<Vec<(i64, String)>>;

    /// Recount denormalized uncracked counters; returns
    /// `(hash_list_id, stored, actual)` for every list that drifted.
    async fn recount_uncracked(&self) -> CoreResult<Vec<(i64, i64, i64)>>;
}
