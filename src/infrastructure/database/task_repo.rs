//! SQLite implementation of the task repository.
//!
//! State transitions are guarded with compare-and-swap `UPDATE ... WHERE`
//! clauses; a guard that matches zero rows means another writer won the race
//! and the caller gets `Conflict`.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{Row, SqlitePool};

use crate::domain::errors::{CoreError, CoreResult};
use crate::domain::models::{Task, TaskEvent, TaskState};
use crate::domain::ports::{PreemptionCandidate, TaskRepository};
use crate::infrastructure::database::utils::{insert_audit, parse_datetime};

pub struct TaskRepositoryImpl {
    pool: SqlitePool,
}

impl TaskRepositoryImpl {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    fn row_to_task(row: &sqlx::sqlite::SqliteRow) -> Result<Task, CoreError> {
        let state_str: String = row.get("state");
        let state = TaskState::from_str(&state_str)
            .ok_or_else(|| CoreError::Database(format!("unknown task state {state_str:?}")))?;

        Ok(Task {
            id: row.get("id"),
            attack_id: row.get("attack_id"),
            agent_id: row.get("agent_id"),
            state,
            stale: row.get::<i64, _>("stale") != 0,
            activity_timestamp: row
                .get::<Option<String>, _>("activity_timestamp")
                .as_deref()
                .map(parse_datetime)
                .transpose()?,
            start_date: parse_datetime(row.get::<String, _>("start_date").as_str())?,
            preemption_count: u32::try_from(row.get::<i64, _>("preemption_count")).unwrap_or(0),
            progress_percent: row.get("progress_percent"),
            created_at: parse_datetime(row.get::<String, _>("created_at").as_str())?,
            updated_at: parse_datetime(row.get::<String, _>("updated_at").as_str())?,
        })
    }

    async fn fetch(&self, id: i64) -> CoreResult<Task> {
        let row = sqlx::query("SELECT * FROM tasks WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref()
            .map(Self::row_to_task)
            .transpose()?
            .ok_or(CoreError::NotFound { entity: "task", id })
    }
}

#[async_trait]
impl TaskRepository for TaskRepositoryImpl {
    async fn get(&self, id: i64) -> CoreResult<Task> {
        self.fetch(id).await
    }

    async fn insert(&self, task: &Task) -> CoreResult<i64> {
        let result = sqlx::query(
            r"
            INSERT INTO tasks (attack_id, agent_id, state, stale, activity_timestamp,
                               start_date, preemption_count, progress_percent,
                               created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            ",
        )
        .bind(task.attack_id)
        .bind(task.agent_id)
        .bind(task.state.as_str())
        .bind(i64::from(task.stale))
        .bind(task.activity_timestamp.map(|dt| dt.to_rfc3339()))
        .bind(task.start_date.to_rfc3339())
        .bind(i64::from(task.preemption_count))
        .bind(task.progress_percent)
        .bind(task.created_at.to_rfc3339())
        .bind(task.updated_at.to_rfc3339())
        .execute(&self.pool)
        .await?;
        Ok(result.last_insert_rowid())
    }

    async fn incomplete_for_agent(&self, agent_id: i64) -> CoreResult<Vec<Task>> {
        let rows = sqlx::query(
            r"
            SELECT * FROM tasks
            WHERE agent_id = ? AND state IN ('pending', 'running')
            ORDER BY created_at ASC
            ",
        )
        .bind(agent_id)
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(Self::row_to_task).collect()
    }

    async fn pending_for_agent_on_attack(
        &self,
        agent_id: i64,
        attack_id: i64,
    ) -> CoreResult<Option<Task>> {
        let row = sqlx::query(
            r"
            SELECT * FROM tasks
            WHERE agent_id = ? AND attack_id = ? AND state = 'pending'
            ORDER BY created_at ASC LIMIT 1
            ",
        )
        .bind(agent_id)
        .bind(attack_id)
        .fetch_optional(&self.pool)
        .await?;
        row.as_ref().map(Self::row_to_task).transpose().map_err(Into::into)
    }

    async fn failed_for_agent_on_attack(
        &self,
        agent_id: i64,
        attack_id: i64,
    ) -> CoreResult<Option<Task>> {
        let row = sqlx::query(
            r"
            SELECT * FROM tasks
            WHERE agent_id = ? AND attack_id = ? AND state = 'failed'
            ORDER BY created_at ASC LIMIT 1
            ",
        )
        .bind(agent_id)
        .bind(attack_id)
        .fetch_optional(&self.pool)
        .await?;
        row.as_ref().map(Self::row_to_task).transpose().map_err(Into::into)
    }

    async fn accept(&self, task_id: i64, agent_id: i64) -> CoreResult<Task> {
        let task = self.fetch(task_id).await?;
        if task.agent_id != agent_id {
            return Err(CoreError::AuthFailure);
        }
        let next = task.state.apply(TaskEvent::Accept)?;
        if task.state == TaskState::Running {
            // Idempotent re-accept
            return Ok(task);
        }

        let now = Utc::now().to_rfc3339();
        let mut tx = self.pool.begin().await?;
        let result = sqlx::query(
            r"
            UPDATE tasks
            SET state = ?, activity_timestamp = ?, updated_at = ?
            WHERE id = ? AND state = 'pending' AND agent_id = ?
            ",
        )
        .bind(next.as_str())
        .bind(&now)
        .bind(&now)
        .bind(task_id)
        .bind(agent_id)
        .execute(&mut *tx)
        .await?;
        if result.rows_affected() == 0 {
            return Err(CoreError::Conflict {
                entity: "task",
                id: task_id,
            });
        }
        insert_audit(
            &mut *tx,
            "task",
            task_id,
            TaskEvent::Accept.as_str(),
            task.state.as_str(),
            next.as_str(),
            Some(agent_id),
        )
        .await?;

        // Accepting a task moves a pending attack to running, idempotently.
        let attack_updated = sqlx::query(
            "UPDATE attacks SET state = 'running', updated_at = ? WHERE id = ? AND state = 'pending'",
        )
        .bind(&now)
        .bind(task.attack_id)
        .execute(&mut *tx)
        .await?;
        if attack_updated.rows_affected() == 1 {
            insert_audit(
                &mut *tx,
                "attack",
                task.attack_id,
                "accept",
                "pending",
                "running",
                Some(agent_id),
            )
            .await?;
        }
        tx.commit().await?;
        self.fetch(task_id).await
    }

    async fn apply_event(&self, task_id: i64, event: TaskEvent) -> CoreResult<Task> {
        let task = self.fetch(task_id).await?;
        let next = task.state.apply(event)?;
        if next == task.state {
            return Ok(task);
        }

        let now = Utc::now().to_rfc3339();
        let mut tx = self.pool.begin().await?;
        let result = sqlx::query(
            "UPDATE tasks SET state = ?, updated_at = ? WHERE id = ? AND state = ?",
        )
        .bind(next.as_str())
        .bind(&now)
        .bind(task_id)
        .bind(task.state.as_str())
        .execute(&mut *tx)
        .await?;
        if result.rows_affected() == 0 {
            return Err(CoreError::Conflict {
                entity: "task",
                id: task_id,
            });
        }
        insert_audit(
            &mut *tx,
            "task",
            task_id,
            event.as_str(),
            task.state.as_str(),
            next.as_str(),
            Some(task.agent_id),
        )
        .await?;
        tx.commit().await?;
        self.fetch(task_id).await
    }

    async fn count_running(&self) -> CoreResult<i64> {
        let row = sqlx::query("SELECT COUNT(*) AS n FROM tasks WHERE state = 'running'")
            .fetch_one(&self.pool)
            .await?;
        Ok(row.get("n"))
    }

    async fn preemption_candidate(
        &self,
        project_id: i64,
        below_priority: i64,
        max_progress: f64,
        starvation_cap: u32,
    ) -> CoreResult<Option<PreemptionCandidate>> {
        let row = sqlx::query(
            r"
            SELECT t.id AS task_id, c.priority, t.progress_percent
            FROM tasks t
            JOIN attacks a ON a.id = t.attack_id
            JOIN campaigns c ON c.id = a.campaign_id
            WHERE t.state = 'running'
              AND c.project_id = ?
              AND c.priority < ?
              AND t.progress_percent < ?
              AND t.preemption_count < ?
            ORDER BY c.priority ASC, t.progress_percent ASC
            LIMIT 1
            ",
        )
        .bind(project_id)
        .bind(below_priority)
        .bind(max_progress)
        .bind(i64::from(starvation_cap))
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|row| PreemptionCandidate {
            task_id: row.get("task_id"),
            campaign_priority: row.get("priority"),
            progress_percent: row.get("progress_percent"),
        }))
    }

    async fn force_set_pending_for_preemption(&self, task_id: i64) -> CoreResult<bool> {
        let now = Utc::now().to_rfc3339();
        let mut tx = self.pool.begin().await?;
        let result = sqlx::query(
            r"
            UPDATE tasks
            SET state = 'pending', stale = 1,
                preemption_count = preemption_count + 1, updated_at = ?
            WHERE id = ? AND state = 'running'
            ",
        )
        .bind(&now)
        .bind(task_id)
        .execute(&mut *tx)
        .await?;

        if result.rows_affected() == 0 {
            return Ok(false);
        }
        insert_audit(&mut *tx, "task", task_id, "preempt", "running", "pending", None).await?;
        tx.commit().await?;
        Ok(true)
    }

    async fn clear_stale_on_zap_download(&self, task_id: i64) -> CoreResult<()> {
        let now = Utc::now().to_rfc3339();
        sqlx::query("UPDATE tasks SET stale = 0, updated_at = ? WHERE id = ?")
            .bind(now)
            .bind(task_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn delete_abandoned_before(
        &self,
        cutoff: DateTime<Utc>,
    ) -> CoreResult<Vec<(i64, i64)>> {
        let cutoff_str = cutoff.to_rfc3339();
        let rows = sqlx::query(
            r"
            SELECT id, attack_id FROM tasks
            WHERE state = 'running'
              AND activity_timestamp IS NOT NULL
              AND activity_timestamp < ?
            ",
        )
        .bind(&cutoff_str)
        .fetch_all(&self.pool)
        .await?;

        let mut deleted = Vec::new();
        for row in rows {
            let task_id: i64 = row.get("id");
            let attack_id: i64 = row.get("attack_id");
            let mut tx = self.pool.begin().await?;
            let result = sqlx::query("DELETE FROM tasks WHERE id = ? AND state = 'running'")
                .bind(task_id)
                .execute(&mut *tx)
                .await?;
            if result.rows_affected() == 1 {
                insert_audit(&mut *tx, "task", task_id, "abandoned", "running", "deleted", None)
                    .await?;
                tx.commit().await?;
                deleted.push((task_id, attack_id));
            }
        }
        Ok(deleted)
    }

    async fn running_exists_for_attack(&self, attack_id: i64) -> CoreResult<bool> {
        let row = sqlx::query(
            "SELECT COUNT(*) AS n FROM tasks WHERE attack_id = ? AND state = 'running'",
        )
        .bind(attack_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(row.get::<i64, _>("n") > 0)
    }

    async fn max_estimated_stop_for_campaign(
        &self,
        campaign_id: i64,
    ) -> CoreResult<Option<DateTime<Utc>>> {
        // RFC 3339 UTC timestamps compare correctly as text.
        let row = sqlx::query(
            r"
            SELECT MAX(s.estimated_stop) AS eta
            FROM tasks t
            JOIN attacks a ON a.id = t.attack_id
            JOIN hashcat_statuses s ON s.id = (
                SELECT s2.id FROM hashcat_statuses s2
                WHERE s2.task_id = t.id ORDER BY s2.id DESC LIMIT 1
            )
            WHERE a.campaign_id = ? AND t.state = 'running' AND a.state = 'running'
            ",
        )
        .bind(campaign_id)
        .fetch_one(&self.pool)
        .await?;

        row.get::<Option<String>, _>("eta")
            .as_deref()
            .map(parse_datetime)
            .transpose()
            .map_err(Into::into)
    }
}
