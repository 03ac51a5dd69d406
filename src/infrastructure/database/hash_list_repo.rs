//! SQLite implementation of the hash list repository.
//!
//! `apply_crack` is the crack-application primitive: item update,
//! cross-list propagation, stale fan-out, counter upkeep, and task
//! completion commit together or not at all.

use async_trait::async_trait;
use chrono::Utc;
use sqlx::{Row, SqlitePool};

use crate::domain::errors::{CoreError, CoreResult};
use crate::domain::models::{HashItem, HashList};
use crate::domain::ports::{CrackApplication, CrackOutcome, HashListRepository};
use crate::infrastructure::database::utils::{insert_audit, parse_datetime};

pub struct HashListRepositoryImpl {
    pool: SqlitePool,
}

impl HashListRepositoryImpl {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    fn row_to_hash_list(row: &sqlx::sqlite::SqliteRow) -> Result<HashList, CoreError> {
        Ok(HashList {
            id: row.get("id"),
            project_id: row.get("project_id"),
            name: row.get("name"),
            hash_type_id: u32::try_from(row.get::<i64, _>("hash_type_id")).unwrap_or(0),
            uncracked_count: row.get("uncracked_count"),
            created_at: parse_datetime(row.get::<String, _>("created_at").as_str())?,
            updated_at: parse_datetime(row.get::<String, _>("updated_at").as_str())?,
        })
    }

    fn row_to_hash_item(row: &sqlx::sqlite::SqliteRow) -> Result<HashItem, CoreError> {
        Ok(HashItem {
            id: row.get("id"),
            hash_list_id: row.get("hash_list_id"),
            hash_value: row.get("hash_value"),
            plain_text: row.get("plain_text"),
            cracked: row.get::<i64, _>("cracked") != 0,
            cracked_time: row
                .get::<Option<String>, _>("cracked_time")
                .as_deref()
                .map(parse_datetime)
                .transpose()?,
            attack_id: row.get("attack_id"),
            created_at: parse_datetime(row.get::<String, _>("created_at").as_str())?,
            updated_at: parse_datetime(row.get::<String, _>("updated_at").as_str())?,
        })
    }
}

#[async_trait]
impl HashListRepository for HashListRepositoryImpl {
    async fn get(&self, id: i64) -> CoreResult<HashList> {
        let row = sqlx::query("SELECT * FROM hash_lists WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref()
            .map(Self::row_to_hash_list)
            .transpose()?
            .ok_or(CoreError::NotFound {
                entity: "hash_list",
                id,
            })
    }

    async fn find_item(
        &self,
        hash_list_id: i64,
        hash_value: &str,
    ) -> CoreResult<Option<HashItem>> {
        let row = sqlx::query("SELECT * FROM hash_items WHERE hash_list_id = ? AND hash_value = ?")
            .bind(hash_list_id)
            .bind(hash_value)
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(Self::row_to_hash_item).transpose().map_err(Into::into)
    }

    #[allow(clippy::too_many_lines)]
    async fn apply_crack(&self, req: &CrackApplication) -> CoreResult<CrackOutcome> {
        let now = Utc::now().to_rfc3339();
        let cracked_time = req.timestamp.to_rfc3339();
        let mut tx = self.pool.begin().await?;

        let item = sqlx::query(
            "SELECT id, cracked FROM hash_items WHERE hash_list_id = ? AND hash_value = ?",
        )
        .bind(req.hash_list_id)
        .bind(&req.hash_value)
        .fetch_optional(&mut *tx)
        .await?;
        let Some(item) = item else {
            return Err(CoreError::HashNotFound);
        };

        if item.get::<i64, _>("cracked") != 0 {
            // Already cracked: idempotent success, nothing overwritten.
            let remaining: i64 =
                sqlx::query("SELECT uncracked_count FROM hash_lists WHERE id = ?")
                    .bind(req.hash_list_id)
                    .fetch_one(&mut *tx)
                    .await?
                    .get("uncracked_count");
            return Ok(CrackOutcome {
                newly_cracked: false,
                propagated: 0,
                stale_marked: 0,
                uncracked_remaining: remaining,
                task_completed: false,
            });
        }

        let item_id: i64 = item.get("id");
        let updated = sqlx::query(
            r"
            UPDATE hash_items
            SET plain_text = ?, cracked = 1, cracked_time = ?, attack_id = ?, updated_at = ?
            WHERE id = ? AND cracked = 0
            ",
        )
        .bind(&req.plain_text)
        .bind(&cracked_time)
        .bind(req.attack_id)
        .bind(&now)
        .bind(item_id)
        .execute(&mut *tx)
        .await?;
        if updated.rows_affected() == 0 {
            return Err(CoreError::Conflict {
                entity: "hash_item",
                id: item_id,
            });
        }

        // Propagate to still-uncracked duplicates across hash lists of the
        // same hash type, optionally gated to the submitting project.
        let propagated = if req.propagate_within_project_only {
            sqlx::query(
                r"
                UPDATE hash_items
                SET plain_text = ?, cracked = 1, cracked_time = ?, attack_id = ?, updated_at = ?
                WHERE cracked = 0 AND hash_value = ? AND hash_list_id IN (
                    SELECT id FROM hash_lists
                    WHERE hash_type_id = ? AND id != ? AND project_id = ?
                )
                ",
            )
            .bind(&req.plain_text)
            .bind(&cracked_time)
            .bind(req.attack_id)
            .bind(&now)
            .bind(&req.hash_value)
            .bind(i64::from(req.hash_type_id))
            .bind(req.hash_list_id)
            .bind(req.project_id)
            .execute(&mut *tx)
            .await?
            .rows_affected()
        } else {
            sqlx::query(
                r"
                UPDATE hash_items
                SET plain_text = ?, cracked = 1, cracked_time = ?, attack_id = ?, updated_at = ?
                WHERE cracked = 0 AND hash_value = ? AND hash_list_id IN (
                    SELECT id FROM hash_lists WHERE hash_type_id = ? AND id != ?
                )
                ",
            )
            .bind(&req.plain_text)
            .bind(&cracked_time)
            .bind(req.attack_id)
            .bind(&now)
            .bind(&req.hash_value)
            .bind(i64::from(req.hash_type_id))
            .bind(req.hash_list_id)
            .execute(&mut *tx)
            .await?
            .rows_affected()
        };

        // Refresh the denormalized counters for every list of this type.
        sqlx::query(
            r"
            UPDATE hash_lists
            SET uncracked_count = (
                    SELECT COUNT(*) FROM hash_items i
                    WHERE i.hash_list_id = hash_lists.id AND i.cracked = 0
                ),
                updated_at = ?
            WHERE hash_type_id = ?
            ",
        )
        .bind(&now)
        .bind(i64::from(req.hash_type_id))
        .execute(&mut *tx)
        .await?;

        // Every other incomplete task whose campaign targets a list that now
        // contains this cracked value must re-fetch zaps.
        let stale_marked = sqlx::query(
            r"
            UPDATE tasks
            SET stale = 1, updated_at = ?
            WHERE id != ? AND state IN ('pending', 'running') AND attack_id IN (
                SELECT a.id FROM attacks a
                JOIN campaigns c ON c.id = a.campaign_id
                WHERE c.hash_list_id IN (
                    SELECT i.hash_list_id FROM hash_items i
                    WHERE i.hash_value = ? AND i.cracked = 1
                )
            )
            ",
        )
        .bind(&now)
        .bind(req.task_id)
        .bind(&req.hash_value)
        .execute(&mut *tx)
        .await?
        .rows_affected();

        let remaining: i64 = sqlx::query("SELECT uncracked_count FROM hash_lists WHERE id = ?")
            .bind(req.hash_list_id)
            .fetch_one(&mut *tx)
            .await?
            .get("uncracked_count");

        // With the list dry, accept_crack carries the task over the finish
        // line in the same transaction.
        let mut task_completed = false;
        if remaining == 0 {
            let result = sqlx::query(
                "UPDATE tasks SET state = 'completed', updated_at = ? WHERE id = ? AND state = 'running'",
            )
            .bind(&now)
            .bind(req.task_id)
            .execute(&mut *tx)
            .await?;
            if result.rows_affected() == 1 {
                task_completed = true;
                insert_audit(
                    &mut *tx,
                    "task",
                    req.task_id,
                    "accept_crack",
                    "running",
                    "completed",
                    None,
                )
                .await?;
            }
            let attack_done = sqlx::query(
                r"
                UPDATE attacks SET state = 'completed', updated_at = ?
                WHERE id = ? AND state IN ('pending', 'running')
                ",
            )
            .bind(&now)
            .bind(req.attack_id)
            .execute(&mut *tx)
            .await?;
            if attack_done.rows_affected() == 1 {
                insert_audit(
                    &mut *tx,
                    "attack",
                    req.attack_id,
                    "complete",
                    "running",
                    "completed",
                    None,
                )
                .await?;
            }
        }

        tx.commit().await?;
        Ok(CrackOutcome {
            newly_cracked: true,
            propagated,
            stale_marked,
            uncracked_remaining: remaining,
            task_completed,
        })
    }

    async fn uncracked_page(
        &self,
        hash_list_id: i64,
        after_id: i64,
        limit: i64,
    ) -> CoreResult<Vec<(i64, String)>> {
        let rows = sqlx::query(
            r"
            SELECT id, hash_value FROM hash_items
            WHERE hash_list_id = ? AND cracked = 0 AND id > ?
            ORDER BY id ASC LIMIT ?
            ",
        )
        .bind(hash_list_id)
        .bind(after_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows
            .iter()
            .map(|r| (r.get::<i64, _>("id"), r.get::<String, _>("hash_value")))
            .collect())
    }

    async fn cracked_page(
        &self,
        hash_list_id: i64,
        after_id: i64,
        limit: i64,
    ) -> CoreResult<Vec<(i64, String)>> {
        let rows = sqlx::query(
            r"
            SELECT id, hash_value, plain_text FROM hash_items
            WHERE hash_list_id = ? AND cracked = 1 AND id > ?
            ORDER BY id ASC LIMIT ?
            ",
        )
        .bind(hash_list_id)
        .bind(after_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows
            .iter()
            .map(|r| {
                let id: i64 = r.get("id");
                let hash: String = r.get("hash_value");
                let line = match r.get::<Option<String>, _>("plain_text") {
                    Some(plain) => format!("{hash}:{plain}"),
                    None => hash,
                };
                (id, line)
            })
            .collect())
    }

    async fn recount_uncracked(&self) -> CoreResult<Vec<(i64, i64, i64)>> {
        let rows = sqlx::query(
            r"
            SELECT h.id, h.uncracked_count AS stored,
                   (SELECT COUNT(*) FROM hash_items i
                    WHERE i.hash_list_id = h.id AND i.cracked = 0) AS actual
            FROM hash_lists h
            ",
        )
        .fetch_all(&self.pool)
        .await?;

        let now = Utc::now().to_rfc3339();
        let mut corrected = Vec::new();
        for row in rows {
            let id: i64 = row.get("id");
            let stored: i64 = row.get("stored");
            let actual: i64 = row.get("actual");
            if stored != actual {
                sqlx::query("UPDATE hash_lists SET uncracked_count = ?, updated_at = ? WHERE id = ?")
                    .bind(actual)
                    .bind(&now)
                    .bind(id)
                    .execute(&self.pool)
                    .await?;
                corrected.push((id, stored, actual));
            }
        }
        Ok(corrected)
    }
}
