//! SQLite implementation of the agent repository.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{Row, SqlitePool};

use crate::domain::errors::{CoreError, CoreResult};
use crate::domain::models::{Agent, AgentEvent, AgentState, HashcatBenchmark};
use crate::domain::ports::{AgentProfile, AgentRepository, NewBenchmark};
use crate::infrastructure::database::utils::{insert_audit, parse_datetime};

pub struct AgentRepositoryImpl {
    pool: SqlitePool,
}

impl AgentRepositoryImpl {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    fn row_to_agent(row: &sqlx::sqlite::SqliteRow) -> Result<Agent, CoreError> {
        let state_str: String = row.get("state");
        let state = AgentState::from_str(&state_str)
            .ok_or_else(|| CoreError::Database(format!("unknown agent state {state_str:?}")))?;
        let devices: Vec<String> = row
            .get::<Option<String>, _>("devices")
            .as_deref()
            .and_then(|s| serde_json::from_str(s).ok())
            .unwrap_or_default();

        Ok(Agent {
            id: row.get("id"),
            name: row.get("name"),
            token: row.get("token"),
            state,
            client_signature: row.get("client_signature"),
            operating_system: row.get("operating_system"),
            devices,
            last_seen_at: row
                .get::<Option<String>, _>("last_seen_at")
                .as_deref()
                .map(parse_datetime)
                .transpose()?,
            created_at: parse_datetime(row.get::<String, _>("created_at").as_str())?,
            updated_at: parse_datetime(row.get::<String, _>("updated_at").as_str())?,
        })
    }
}

#[async_trait]
impl AgentRepository for AgentRepositoryImpl {
    async fn get(&self, id: i64) -> CoreResult<Agent> {
        let row = sqlx::query("SELECT * FROM agents WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(Self::row_to_agent).transpose()?.ok_or(CoreError::NotFound {
            entity: "agent",
            id,
        })
    }

    async fn get_by_token(&self, token: &str) -> CoreResult<Option<Agent>> {
        let row = sqlx::query("SELECT * FROM agents WHERE token = ?")
            .bind(token)
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(Self::row_to_agent).transpose().map_err(Into::into)
    }

    async fn insert(&self, agent: &Agent, project_ids: &[i64]) -> CoreResult<i64> {
        let devices = serde_json::to_string(&agent.devices)?;
        let created_at = agent.created_at.to_rfc3339();
        let updated_at = agent.updated_at.to_rfc3339();
        let last_seen_at = agent.last_seen_at.map(|dt| dt.to_rfc3339());

        let mut tx = self.pool.begin().await?;
        let result = sqlx::query(
            r"
            INSERT INTO agents (name, token, state, client_signature, operating_system,
                                devices, last_seen_at, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
            ",
        )
        .bind(&agent.name)
        .bind(&agent.token)
        .bind(agent.state.as_str())
        .bind(&agent.client_signature)
        .bind(&agent.operating_system)
        .bind(devices)
        .bind(last_seen_at)
        .bind(created_at)
        .bind(updated_at)
        .execute(&mut *tx)
        .await?;

        let agent_id = result.last_insert_rowid();
        for project_id in project_ids {
            sqlx::query("INSERT INTO agent_projects (agent_id, project_id) VALUES (?, ?)")
                .bind(agent_id)
                .bind(project_id)
                .execute(&mut *tx)
                .await?;
        }
        tx.commit().await?;
        Ok(agent_id)
    }

    async fn update_profile(&self, id: i64, profile: &AgentProfile) -> CoreResult<()> {
        let devices = profile
            .devices
            .as_ref()
            .map(serde_json::to_string)
            .transpose()?;
        let now = Utc::now().to_rfc3339();

        let result = sqlx::query(
            r"
            UPDATE agents
            SET name = COALESCE(?, name),
                client_signature = COALESCE(?, client_signature),
                operating_system = COALESCE(?, operating_system),
                devices = COALESCE(?, devices),
                updated_at = ?
            WHERE id = ?
            ",
        )
        .bind(&profile.name)
        .bind(&profile.client_signature)
        .bind(&profile.operating_system)
        .bind(devices)
        .bind(now)
        .bind(id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(CoreError::NotFound { entity: "agent", id });
        }
        Ok(())
    }

    async fn apply_event(&self, id: i64, event: AgentEvent) -> CoreResult<AgentState> {
        let agent = self.get(id).await?;
        let next = agent.state.apply(event)?;
        if next == agent.state {
            return Ok(next);
        }

        let now = Utc::now().to_rfc3339();
        let mut tx = self.pool.begin().await?;
        let result = sqlx::query("UPDATE agents SET state = ?, updated_at = ? WHERE id = ? AND state = ?")
            .bind(next.as_str())
            .bind(now)
            .bind(id)
            .bind(agent.state.as_str())
            .execute(&mut *tx)
            .await?;
        if result.rows_affected() == 0 {
            return Err(CoreError::Conflict { entity: "agent", id });
        }
        insert_audit(
            &mut *tx,
            "agent",
            id,
            event.as_str(),
            agent.state.as_str(),
            next.as_str(),
            Some(id),
        )
        .await?;
        tx.commit().await?;
        Ok(next)
    }

    async fn touch_last_seen(&self, id: i64) -> CoreResult<()> {
        let now = Utc::now().to_rfc3339();
        sqlx::query("UPDATE agents SET last_seen_at = ?, updated_at = ? WHERE id = ?")
            .bind(&now)
            .bind(&now)
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn project_ids(&self, agent_id: i64) -> CoreResult<Vec<i64>> {
        let rows = sqlx::query("SELECT project_id FROM agent_projects WHERE agent_id = ?")
            .bind(agent_id)
            .fetch_all(&self.pool)
            .await?;
        Ok(rows.iter().map(|r| r.get("project_id")).collect())
    }

    async fn replace_benchmarks(
        &self,
        agent_id: i64,
        benchmarks: &[NewBenchmark],
    ) -> CoreResult<()> {
        let now = Utc::now().to_rfc3339();
        let mut tx = self.pool.begin().await?;
        sqlx::query("DELETE FROM agent_benchmarks WHERE agent_id = ?")
            .bind(agent_id)
            .execute(&mut *tx)
            .await?;
        for b in benchmarks {
            sqlx::query(
                r"
                INSERT INTO agent_benchmarks (agent_id, device, hash_type, hash_speed, runtime_ms, created_at)
                VALUES (?, ?, ?, ?, ?, ?)
                ",
            )
            .bind(agent_id)
            .bind(i64::from(b.device))
            .bind(i64::from(b.hash_type))
            .bind(b.hash_speed)
            .bind(b.runtime_ms)
            .bind(&now)
            .execute(&mut *tx)
            .await?;
        }
        tx.commit().await?;
        Ok(())
    }

    async fn benchmarks(&self, agent_id: i64) -> CoreResult<Vec<HashcatBenchmark>> {
        let rows = sqlx::query("SELECT * FROM agent_benchmarks WHERE agent_id = ? ORDER BY id")
            .bind(agent_id)
            .fetch_all(&self.pool)
            .await?;
        rows.iter()
            .map(|row| {
                Ok(HashcatBenchmark {
                    id: row.get("id"),
                    agent_id: row.get("agent_id"),
                    device: u32::try_from(row.get::<i64, _>("device")).unwrap_or(0),
                    hash_type: u32::try_from(row.get::<i64, _>("hash_type")).unwrap_or(0),
                    hash_speed: row.get("hash_speed"),
                    runtime_ms: row.get("runtime_ms"),
                    created_at: parse_datetime(row.get::<String, _>("created_at").as_str())?,
                })
            })
            .collect()
    }

    async fn benchmarked_hash_types(&self, agent_id: i64) -> CoreResult<Vec<u32>> {
        let rows = sqlx::query(
            "SELECT DISTINCT hash_type FROM agent_benchmarks WHERE agent_id = ? ORDER BY hash_type",
        )
        .bind(agent_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows
            .iter()
            .filter_map(|r| u32::try_from(r.get::<i64, _>("hash_type")).ok())
            .collect())
    }

    async fn fastest_speed(&self, agent_id: i64, hash_type: u32) -> CoreResult<Option<f64>> {
        let row = sqlx::query(
            "SELECT MAX(hash_speed) AS speed FROM agent_benchmarks WHERE agent_id = ? AND hash_type = ?",
        )
        .bind(agent_id)
        .bind(i64::from(hash_type))
        .fetch_one(&self.pool)
        .await?;
        Ok(row.get::<Option<f64>, _>("speed"))
    }

    async fn fleet_fastest_speed(&self, hash_type: u32) -> CoreResult<Option<f64>> {
        let row = sqlx::query(
            r"
            SELECT MAX(b.hash_speed) AS speed
            FROM agent_benchmarks b
            JOIN agents a ON a.id = b.agent_id
            WHERE b.hash_type = ? AND a.state IN ('active', 'pending')
            ",
        )
        .bind(i64::from(hash_type))
        .fetch_one(&self.pool)
        .await?;
        Ok(row.get::<Option<f64>, _>("speed"))
    }

    async fn count_active(&self) -> CoreResult<i64> {
        let row = sqlx::query("SELECT COUNT(*) AS n FROM agents WHERE state = 'active'")
            .fetch_one(&self.pool)
            .await?;
        Ok(row.get("n"))
    }

    async fn mark_offline_before(&self, cutoff: DateTime<Utc>) -> CoreResult<Vec<i64>> {
        let cutoff_str = cutoff.to_rfc3339();
        let rows = sqlx::query(
            r"
            SELECT id, state FROM agents
            WHERE state IN ('active', 'pending')
              AND last_seen_at IS NOT NULL
              AND last_seen_at < ?
            ",
        )
        .bind(&cutoff_str)
        .fetch_all(&self.pool)
        .await?;

        let mut transitioned = Vec::new();
        let now = Utc::now().to_rfc3339();
        for row in rows {
            let id: i64 = row.get("id");
            let from: String = row.get("state");
            let mut tx = self.pool.begin().await?;
            let result = sqlx::query(
                "UPDATE agents SET state = 'offline', updated_at = ? WHERE id = ? AND state = ?",
            )
            .bind(&now)
            .bind(id)
            .bind(&from)
            .execute(&mut *tx)
            .await?;
            if result.rows_affected() == 1 {
                insert_audit(&mut *tx, "agent", id, "mark_offline", &from, "offline", None)
                    .await?;
                tx.commit().await?;
                transitioned.push(id);
            }
        }
        Ok(transitioned)
    }
}
