//! SQLite implementations of the audit log, agent error, and cracker
//! release repositories.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{Row, SqlitePool};

use crate::domain::errors::{CoreError, CoreResult};
use crate::domain::models::Severity;
use crate::domain::ports::{
    AgentErrorRepository, AuditEntry, AuditRepository, CrackerRelease, CrackerRepository,
};
use crate::infrastructure::database::utils::parse_datetime;

pub struct AuditRepositoryImpl {
    pool: SqlitePool,
}

impl AuditRepositoryImpl {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl AuditRepository for AuditRepositoryImpl {
    async fn delete_older_than(&self, cutoff: DateTime<Utc>) -> CoreResult<u64> {
        let result = sqlx::query("DELETE FROM audit_log WHERE created_at < ?")
            .bind(cutoff.to_rfc3339())
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }

    async fn recent(&self, limit: i64) -> CoreResult<Vec<AuditEntry>> {
        let rows = sqlx::query("SELECT * FROM audit_log ORDER BY id DESC LIMIT ?")
            .bind(limit)
            .fetch_all(&self.pool)
            .await?;
        rows.iter()
            .map(|row| {
                Ok(AuditEntry {
                    id: row.get("id"),
                    entity_kind: row.get("entity_kind"),
                    entity_id: row.get("entity_id"),
                    event: row.get("event"),
                    from_state: row.get("from_state"),
                    to_state: row.get("to_state"),
                    agent_id: row.get("agent_id"),
                    created_at: parse_datetime(row.get::<String, _>("created_at").as_str())?,
                })
            })
            .collect()
    }
}

pub struct AgentErrorRepositoryImpl {
    pool: SqlitePool,
}

impl AgentErrorRepositoryImpl {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl AgentErrorRepository for AgentErrorRepositoryImpl {
    async fn insert(
        &self,
        agent_id: i64,
        task_id: Option<i64>,
        severity: Severity,
        message: &str,
        metadata: Option<&serde_json::Value>,
    ) -> CoreResult<i64> {
        let metadata = metadata.map(serde_json::to_string).transpose()?;
        let now = Utc::now().to_rfc3339();
        let result = sqlx::query(
            r"
            INSERT INTO agent_errors (agent_id, task_id, severity, message, metadata, created_at)
            VALUES (?, ?, ?, ?, ?, ?)
            ",
        )
        .bind(agent_id)
        .bind(task_id)
        .bind(severity.as_str())
        .bind(message)
        .bind(metadata)
        .bind(now)
        .execute(&self.pool)
        .await?;
        Ok(result.last_insert_rowid())
    }

    async fn fatal_exists_for_task(&self, task_id: i64) -> CoreResult<bool> {
        let row = sqlx::query(
            "SELECT COUNT(*) AS n FROM agent_errors WHERE task_id = ? AND severity = 'fatal'",
        )
        .bind(task_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(row.get::<i64, _>("n") > 0)
    }

    async fn delete_older_than(&self, cutoff: DateTime<Utc>) -> CoreResult<u64> {
        let result = sqlx::query("DELETE FROM agent_errors WHERE created_at < ?")
            .bind(cutoff.to_rfc3339())
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }
}

pub struct CrackerRepositoryImpl {
    pool: SqlitePool,
}

impl CrackerRepositoryImpl {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl CrackerRepository for CrackerRepositoryImpl {
    async fn latest_for_os(&self, operating_system: &str) -> CoreResult<Option<CrackerRelease>> {
        let row = sqlx::query(
            "SELECT * FROM cracker_releases WHERE operating_system = ? ORDER BY id DESC LIMIT 1",
        )
        .bind(operating_system)
        .fetch_optional(&self.pool)
        .await?;

        row.map(|row| -> Result<CrackerRelease, CoreError> {
            Ok(CrackerRelease {
                id: row.get("id"),
                operating_system: row.get("operating_system"),
                version: row.get("version"),
                download_url: row.get("download_url"),
                exec_name: row.get("exec_name"),
                created_at: parse_datetime(row.get::<String, _>("created_at").as_str())?,
            })
        })
        .transpose()
        .map_err(Into::into)
    }
}
