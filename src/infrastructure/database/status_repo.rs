//! SQLite implementation of the status repository.
//!
//! The guess block and per-device telemetry ride along as JSON columns on
//! the status row, so retention trims whole rows.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{Row, SqlitePool};

use crate::domain::errors::{CoreError, CoreResult};
use crate::domain::models::HashcatStatus;
use crate::domain::ports::StatusRepository;
use crate::infrastructure::database::utils::parse_datetime;

pub struct StatusRepositoryImpl {
    pool: SqlitePool,
}

impl StatusRepositoryImpl {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    fn row_to_status(row: &sqlx::sqlite::SqliteRow) -> Result<HashcatStatus, CoreError> {
        let guess_json: String = row.get("hashcat_guess");
        let devices_json: String = row.get("device_statuses");
        Ok(HashcatStatus {
            id: row.get("id"),
            task_id: row.get("task_id"),
            session: row.get("session"),
            status: i32::try_from(row.get::<i64, _>("status")).unwrap_or(0),
            time_start: parse_datetime(row.get::<String, _>("time_start").as_str())?,
            estimated_stop: row
                .get::<Option<String>, _>("estimated_stop")
                .as_deref()
                .map(parse_datetime)
                .transpose()?,
            progress_done: row.get("progress_done"),
            progress_total: row.get("progress_total"),
            restore_point: row.get("restore_point"),
            rejected: row.get("rejected"),
            guess: serde_json::from_str(&guess_json)?,
            devices: serde_json::from_str(&devices_json)?,
            created_at: parse_datetime(row.get::<String, _>("created_at").as_str())?,
        })
    }
}

#[async_trait]
impl StatusRepository for StatusRepositoryImpl {
    async fn insert(&self, status: &HashcatStatus) -> CoreResult<i64> {
        let guess = serde_json::to_string(&status.guess)?;
        let devices = serde_json::to_string(&status.devices)?;
        let now = Utc::now().to_rfc3339();
        let progress = status.progress_percent();

        let mut tx = self.pool.begin().await?;
        let result = sqlx::query(
            r"
            INSERT INTO hashcat_statuses (task_id, session, status, time_start, estimated_stop,
                                          progress_done, progress_total, restore_point, rejected,
                                          hashcat_guess, device_statuses, created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            ",
        )
        .bind(status.task_id)
        .bind(&status.session)
        .bind(i64::from(status.status))
        .bind(status.time_start.to_rfc3339())
        .bind(status.estimated_stop.map(|dt| dt.to_rfc3339()))
        .bind(status.progress_done)
        .bind(status.progress_total)
        .bind(status.restore_point)
        .bind(status.rejected)
        .bind(guess)
        .bind(devices)
        .bind(&now)
        .execute(&mut *tx)
        .await?;

        // Every status bumps the task's activity timestamp and progress.
        sqlx::query(
            r"
            UPDATE tasks SET activity_timestamp = ?, progress_percent = ?, updated_at = ?
            WHERE id = ?
            ",
        )
        .bind(&now)
        .bind(progress)
        .bind(&now)
        .bind(status.task_id)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(result.last_insert_rowid())
    }

    async fn latest_for_task(&self, task_id: i64) -> CoreResult<Option<HashcatStatus>> {
        let row = sqlx::query(
            "SELECT * FROM hashcat_statuses WHERE task_id = ? ORDER BY id DESC LIMIT 1",
        )
        .bind(task_id)
        .fetch_optional(&self.pool)
        .await?;
        row.as_ref().map(Self::row_to_status).transpose().map_err(Into::into)
    }

    async fn trim_to_recent(&self, keep: u32) -> CoreResult<u64> {
        let result = sqlx::query(
            r"
            DELETE FROM hashcat_statuses
            WHERE id IN (
                SELECT s.id FROM hashcat_statuses s
                JOIN tasks t ON t.id = s.task_id
                WHERE t.state IN ('pending', 'running')
                  AND s.id NOT IN (
                      SELECT s2.id FROM hashcat_statuses s2
                      WHERE s2.task_id = s.task_id
                      ORDER BY s2.id DESC LIMIT ?
                  )
            )
            ",
        )
        .bind(i64::from(keep))
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected())
    }

    async fn delete_for_terminal_tasks(&self) -> CoreResult<u64> {
        let result = sqlx::query(
            r"
            DELETE FROM hashcat_statuses
            WHERE task_id IN (SELECT id FROM tasks WHERE state IN ('completed', 'exhausted'))
            ",
        )
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected())
    }

    async fn delete_older_than(&self, cutoff: DateTime<Utc>) -> CoreResult<u64> {
        let result = sqlx::query("DELETE FROM hashcat_statuses WHERE created_at < ?")
            .bind(cutoff.to_rfc3339())
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }
}
