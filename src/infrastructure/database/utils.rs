//! Shared helpers for the SQLite repositories.

use chrono::{DateTime, Utc};
use sqlx::{Executor, Sqlite};

use crate::domain::errors::CoreError;

/// Parse an RFC 3339 timestamp stored as TEXT.
pub fn parse_datetime(s: &str) -> Result<DateTime<Utc>, CoreError> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| CoreError::Database(format!("invalid timestamp {s:?}: {e}")))
}

/// Append one audit row for an applied state transition. Runs on whatever
/// executor the caller is inside, so transitions and their audit records
/// commit together.
pub async fn insert_audit<'e, E>(
    executor: E,
    entity_kind: &str,
    entity_id: i64,
    event: &str,
    from_state: &str,
    to_state: &str,
    agent_id: Option<i64>,
) -> Result<(), sqlx::Error>
where
    E: Executor<'e, Database = Sqlite>,
{
    let now = Utc::now().to_rfc3339();
    sqlx::query(
        r"
        INSERT INTO audit_log (entity_kind, entity_id, event, from_state, to_state, agent_id, created_at)
        VALUES (?, ?, ?, ?, ?, ?, ?)
        ",
    )
    .bind(entity_kind)
    .bind(entity_id)
    .bind(event)
    .bind(from_state)
    .bind(to_state)
    .bind(agent_id)
    .bind(now)
    .execute(executor)
    .await?;

    tracing::info!(
        entity = entity_kind,
        id = entity_id,
        event,
        from = from_state,
        to = to_state,
        "state transition"
    );
    Ok(())
}
