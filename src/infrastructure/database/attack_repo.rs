//! SQLite implementation of the attack repository.

use async_trait::async_trait;
use chrono::Utc;
use sqlx::{Row, SqlitePool};

use crate::domain::errors::{CoreError, CoreResult};
use crate::domain::models::{
    Attack, AttackEvent, AttackMode, AttackState, Campaign, Resource, ResourceKind,
};
use crate::domain::ports::{AttackRepository, CandidateAttack};
use crate::infrastructure::database::campaign_repo::CampaignRepositoryImpl;
use crate::infrastructure::database::utils::{insert_audit, parse_datetime};

pub struct AttackRepositoryImpl {
    pool: SqlitePool,
}

impl AttackRepositoryImpl {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    fn row_to_attack(row: &sqlx::sqlite::SqliteRow) -> Result<Attack, CoreError> {
        let state_str: String = row.get("state");
        let state = AttackState::from_str(&state_str)
            .ok_or_else(|| CoreError::Database(format!("unknown attack state {state_str:?}")))?;
        let mode_str: String = row.get("attack_mode");
        let attack_mode = AttackMode::from_str(&mode_str)
            .ok_or_else(|| CoreError::Database(format!("unknown attack mode {mode_str:?}")))?;

        let opt_u32 = |v: Option<i64>| v.and_then(|v| u32::try_from(v).ok());

        Ok(Attack {
            id: row.get("id"),
            campaign_id: row.get("campaign_id"),
            name: row.get("name"),
            attack_mode,
            hash_mode: u32::try_from(row.get::<i64, _>("hash_mode")).unwrap_or(0),
            state,
            mask: row.get("mask"),
            increment_mode: row.get::<i64, _>("increment_mode") != 0,
            increment_minimum: opt_u32(row.get("increment_minimum")),
            increment_maximum: opt_u32(row.get("increment_maximum")),
            optimized: row.get::<i64, _>("optimized") != 0,
            slow_candidate_generators: row.get::<i64, _>("slow_candidate_generators") != 0,
            workload_profile: u8::try_from(row.get::<i64, _>("workload_profile")).unwrap_or(3),
            disable_markov: row.get::<i64, _>("disable_markov") != 0,
            classic_markov: row.get::<i64, _>("classic_markov") != 0,
            markov_threshold: opt_u32(row.get("markov_threshold")),
            word_list_id: row.get("word_list_id"),
            rule_list_id: row.get("rule_list_id"),
            mask_list_id: row.get("mask_list_id"),
            custom_charset_1: row.get("custom_charset_1"),
            custom_charset_2: row.get("custom_charset_2"),
            custom_charset_3: row.get("custom_charset_3"),
            custom_charset_4: row.get("custom_charset_4"),
            left_rule: row.get("left_rule"),
            right_rule: row.get("right_rule"),
            complexity_value: row.get("complexity_value"),
            created_at: parse_datetime(row.get::<String, _>("created_at").as_str())?,
            updated_at: parse_datetime(row.get::<String, _>("updated_at").as_str())?,
        })
    }
}

#[async_trait]
impl AttackRepository for AttackRepositoryImpl {
    async fn get(&self, id: i64) -> CoreResult<Attack> {
        let row = sqlx::query("SELECT * FROM attacks WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref()
            .map(Self::row_to_attack)
            .transpose()?
            .ok_or(CoreError::NotFound {
                entity: "attack",
                id,
            })
    }

    async fn campaign_of(&self, attack_id: i64) -> CoreResult<Campaign> {
        let row = sqlx::query(
            r"
            SELECT c.* FROM campaigns c
            JOIN attacks a ON a.campaign_id = c.id
            WHERE a.id = ?
            ",
        )
        .bind(attack_id)
        .fetch_optional(&self.pool)
        .await?;
        row.as_ref()
            .map(CampaignRepositoryImpl::row_to_campaign)
            .transpose()?
            .ok_or(CoreError::NotFound {
                entity: "attack",
                id: attack_id,
            })
    }

    async fn apply_event(&self, id: i64, event: AttackEvent) -> CoreResult<AttackState> {
        let attack = self.get(id).await?;
        let next = attack.state.apply(event)?;
        if next == attack.state {
            return Ok(next);
        }

        let now = Utc::now().to_rfc3339();
        let mut tx = self.pool.begin().await?;
        let result =
            sqlx::query("UPDATE attacks SET state = ?, updated_at = ? WHERE id = ? AND state = ?")
                .bind(next.as_str())
                .bind(now)
                .bind(id)
                .bind(attack.state.as_str())
                .execute(&mut *tx)
                .await?;
        if result.rows_affected() == 0 {
            return Err(CoreError::Conflict {
                entity: "attack",
                id,
            });
        }
        insert_audit(
            &mut *tx,
            "attack",
            id,
            event.as_str(),
            attack.state.as_str(),
            next.as_str(),
            None,
        )
        .await?;
        tx.commit().await?;
        Ok(next)
    }

    async fn starved_attacks(&self) -> CoreResult<Vec<CandidateAttack>> {
        let rows = sqlx::query(
            r"
            SELECT a.id AS attack_id, a.hash_mode, a.complexity_value,
                   c.id AS campaign_id, c.priority, c.project_id, c.hash_list_id,
                   h.uncracked_count
            FROM attacks a
            JOIN campaigns c ON c.id = a.campaign_id
            JOIN hash_lists h ON h.id = c.hash_list_id
            WHERE a.state IN ('pending', 'running')
              AND c.state = 'active'
              AND c.priority >= 0
              AND h.uncracked_count > 0
              AND NOT EXISTS (
                  SELECT 1 FROM tasks t WHERE t.attack_id = a.id AND t.state = 'running'
              )
            ORDER BY c.priority DESC, a.complexity_value ASC, a.created_at ASC
            ",
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .iter()
            .map(|row| CandidateAttack {
                attack_id: row.get("attack_id"),
                campaign_id: row.get("campaign_id"),
                project_id: row.get("project_id"),
                hash_list_id: row.get("hash_list_id"),
                priority: row.get("priority"),
                hash_mode: u32::try_from(row.get::<i64, _>("hash_mode")).unwrap_or(0),
                complexity_value: row.get("complexity_value"),
                uncracked_count: row.get("uncracked_count"),
            })
            .collect())
    }

    async fn unstarted_for_campaign(
        &self,
        campaign_id: i64,
    ) -> CoreResult<Vec<(i64, u32, i64)>> {
        let rows = sqlx::query(
            r"
            SELECT id, hash_mode, complexity_value FROM attacks
            WHERE campaign_id = ? AND state IN ('pending', 'paused')
            ",
        )
        .bind(campaign_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows
            .iter()
            .map(|row| {
                (
                    row.get::<i64, _>("id"),
                    u32::try_from(row.get::<i64, _>("hash_mode")).unwrap_or(0),
                    row.get::<i64, _>("complexity_value"),
                )
            })
            .collect())
    }

    async fn resource(&self, id: i64) -> CoreResult<Resource> {
        let row = sqlx::query("SELECT * FROM resources WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or(CoreError::NotFound {
                entity: "resource",
                id,
            })?;

        let kind_str: String = row.get("kind");
        let kind = ResourceKind::from_str(&kind_str)
            .ok_or_else(|| CoreError::Database(format!("unknown resource kind {kind_str:?}")))?;
        Ok(Resource {
            id: row.get("id"),
            project_id: row.get("project_id"),
            name: row.get("name"),
            kind,
            store_key: row.get("store_key"),
            checksum: row.get("checksum"),
            line_count: row.get("line_count"),
            created_at: parse_datetime(row.get::<String, _>("created_at").as_str())?,
            updated_at: parse_datetime(row.get::<String, _>("updated_at").as_str())?,
        })
    }
}
