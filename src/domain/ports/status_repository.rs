//! Status repository port.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::domain::errors::CoreResult;
use crate::domain::models::HashcatStatus;

#[async_trait]
pub trait StatusRepository: Send + Sync {
    /// Persist a snapshot and, in the same transaction, bump the task's
    /// activity timestamp and denormalized progress.
    async fn insert(&self, status: &HashcatStatus) -> CoreResult<i64>;

    async fn latest_for_task(&self, task_id: i64) -> CoreResult<Option<HashcatStatus>>;

    /// Keep only the `keep` most recent rows per pending/running task.
    async fn trim_to_recent(&self, keep: u32) -> CoreResult<u64>;

    /// Drop every status row belonging to a terminal task.
    async fn delete_for_terminal_tasks(&self) -> CoreResult<u64>;

    async fn delete_older_than(&self, cutoff: DateTime<Utc>) -> CoreResult<u64>;
}
