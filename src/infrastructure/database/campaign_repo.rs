//! SQLite implementation of the campaign repository.

use async_trait::async_trait;
use chrono::Utc;
use sqlx::{Row, SqlitePool};

use crate::domain::errors::{CoreError, CoreResult};
use crate::domain::models::{Campaign, CampaignEvent, CampaignPriority, CampaignState};
use crate::domain::ports::{CampaignRepository, CandidateAttack};
use crate::infrastructure::database::utils::{insert_audit, parse_datetime};

pub struct CampaignRepositoryImpl {
    pool: SqlitePool,
}

impl CampaignRepositoryImpl {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub(crate) fn row_to_campaign(row: &sqlx::sqlite::SqliteRow) -> Result<Campaign, CoreError> {
        let state_str: String = row.get("state");
        let state = CampaignState::from_str(&state_str)
            .ok_or_else(|| CoreError::Database(format!("unknown campaign state {state_str:?}")))?;
        let priority_raw: i64 = row.get("priority");
        let priority = CampaignPriority::from_i64(priority_raw).ok_or_else(|| {
            CoreError::Database(format!("unknown campaign priority {priority_raw}"))
        })?;

        Ok(Campaign {
            id: row.get("id"),
            project_id: row.get("project_id"),
            hash_list_id: row.get("hash_list_id"),
            name: row.get("name"),
            priority,
            state,
            created_at: parse_datetime(row.get::<String, _>("created_at").as_str())?,
            updated_at: parse_datetime(row.get::<String, _>("updated_at").as_str())?,
        })
    }

    fn row_to_candidate(row: &sqlx::sqlite::SqliteRow) -> CandidateAttack {
        CandidateAttack {
            attack_id: row.get("attack_id"),
            campaign_id: row.get("campaign_id"),
            project_id: row.get("project_id"),
            hash_list_id: row.get("hash_list_id"),
            priority: row.get("priority"),
            hash_mode: u32::try_from(row.get::<i64, _>("hash_mode")).unwrap_or(0),
            complexity_value: row.get("complexity_value"),
            uncracked_count: row.get("uncracked_count"),
        }
    }
}

#[async_trait]
impl CampaignRepository for CampaignRepositoryImpl {
    async fn get(&self, id: i64) -> CoreResult<Campaign> {
        let row = sqlx::query("SELECT * FROM campaigns WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref()
            .map(Self::row_to_campaign)
            .transpose()?
            .ok_or(CoreError::NotFound {
                entity: "campaign",
                id,
            })
    }

    async fn apply_event(&self, id: i64, event: CampaignEvent) -> CoreResult<CampaignState> {
        let campaign = self.get(id).await?;
        let next = campaign.state.apply(event)?;
        if next == campaign.state {
            return Ok(next);
        }

        let now = Utc::now().to_rfc3339();
        let mut tx = self.pool.begin().await?;
        let result =
            sqlx::query("UPDATE campaigns SET state = ?, updated_at = ? WHERE id = ? AND state = ?")
                .bind(next.as_str())
                .bind(now)
                .bind(id)
                .bind(campaign.state.as_str())
                .execute(&mut *tx)
                .await?;
        if result.rows_affected() == 0 {
            return Err(CoreError::Conflict {
                entity: "campaign",
                id,
            });
        }
        insert_audit(
            &mut *tx,
            "campaign",
            id,
            event.as_str(),
            campaign.state.as_str(),
            next.as_str(),
            None,
        )
        .await?;
        tx.commit().await?;
        Ok(next)
    }

    async fn candidate_attacks(
        &self,
        project_ids: &[i64],
        hash_types: &[u32],
    ) -> CoreResult<Vec<CandidateAttack>> {
        if project_ids.is_empty() || hash_types.is_empty() {
            return Ok(Vec::new());
        }

        let project_marks = vec!["?"; project_ids.len()].join(", ");
        let type_marks = vec!["?"; hash_types.len()].join(", ");
        let sql = format!(
            r"
            SELECT a.id AS attack_id, a.hash_mode, a.complexity_value,
                   c.id AS campaign_id, c.priority, c.project_id, c.hash_list_id,
                   h.uncracked_count
            FROM attacks a
            JOIN campaigns c ON c.id = a.campaign_id
            JOIN hash_lists h ON h.id = c.hash_list_id
            WHERE a.state IN ('pending', 'running')
              AND c.state = 'active'
              AND c.project_id IN ({project_marks})
              AND h.hash_type_id IN ({type_marks})
              AND h.uncracked_count > 0
            ORDER BY c.priority DESC, a.complexity_value ASC, a.created_at ASC
            "
        );

        let mut query = sqlx::query(&sql);
        for id in project_ids {
            query = query.bind(id);
        }
        for ht in hash_types {
            query = query.bind(i64::from(*ht));
        }

        let rows = query.fetch_all(&self.pool).await?;
        Ok(rows.iter().map(Self::row_to_candidate).collect())
    }

    async fn activity_fingerprint(&self, campaign_id: i64) -> CoreResult<(String, String)> {
        let row = sqlx::query(
            r"
            SELECT
                (SELECT COALESCE(MAX(updated_at), '') FROM attacks WHERE campaign_id = ?) AS attacks_fp,
                (SELECT COALESCE(MAX(t.updated_at), '') FROM tasks t
                 JOIN attacks a ON a.id = t.attack_id
                 WHERE a.campaign_id = ?) AS tasks_fp
            ",
        )
        .bind(campaign_id)
        .bind(campaign_id)
        .fetch_one(&self.pool)
        .await?;
        Ok((row.get("attacks_fp"), row.get("tasks_fp")))
    }

    async fn all_attacks_terminal(&self, campaign_id: i64) -> CoreResult<bool> {
        let row = sqlx::query(
            r"
            SELECT COUNT(*) AS total,
                   SUM(CASE WHEN state IN ('completed', 'exhausted', 'failed') THEN 1 ELSE 0 END) AS terminal
            FROM attacks WHERE campaign_id = ?
            ",
        )
        .bind(campaign_id)
        .fetch_one(&self.pool)
        .await?;
        let total: i64 = row.get("total");
        let terminal: i64 = row.get::<Option<i64>, _>("terminal").unwrap_or(0);
        Ok(total > 0 && terminal == total)
    }
}
