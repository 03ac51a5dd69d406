//! Audit log, agent error, and cracker release ports.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::errors::CoreResult;
use crate::domain::models::Severity;

/// One recorded state transition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditEntry {
    pub id: i64,
    pub entity_kind: String,
    pub entity_id: i64,
    pub event: String,
    pub from_state: String,
    pub to_state: String,
    pub agent_id: Option<i64>,
    pub created_at: DateTime<Utc>,
}

#[async_trait]
pub trait AuditRepository: Send + Sync {
    async fn delete_older_than(&self, cutoff: DateTime<Utc>) -> CoreResult<u64>;

    /// Most recent entries, newest first. Test and operator visibility.
    async fn recent(&self, limit: i64) -> CoreResult<Vec<AuditEntry>>;
}

#[async_trait]
pub trait AgentErrorRepository: Send + Sync {
    async fn insert(
        &self,
        agent_id: i64,
        task_id: Option<i64>,
        severity: Severity,
        message: &str,
        metadata: Option<&serde_json::Value>,
    ) -> CoreResult<i64>;

    /// Whether a fatal-severity error is recorded against the task.
    async fn fatal_exists_for_task(&self, task_id: i64) -> CoreResult<bool>;

    async fn delete_older_than(&self, cutoff: DateTime<Utc>) -> CoreResult<u64>;
}

/// A published cracker binary version for one operating system.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CrackerRelease {
    pub id: i64,
    pub operating_system: String,
    pub version: String,
    pub download_url: String,
    pub exec_name: String,
    pub created_at: DateTime<Utc>,
}

#[async_trait]
pub trait CrackerRepository: Send + Sync {
    async fn latest_for_os(&self, operating_system: &str) -> CoreResult<Option<CrackerRelease>>;
}
