//! Shared fixtures for the integration tests.
//!
//! Tests run against a file-backed SQLite database in a temp directory so
//! every pooled connection sees the same data.

#![allow(dead_code)]

use chrono::{DateTime, Duration, Utc};
use sqlx::SqlitePool;
use tempfile::TempDir;

use cipherswarm::DatabaseConnection;

/// A migrated database living in its own temp directory.
pub struct TestDb {
    pub pool: SqlitePool,
    _dir: TempDir,
}

pub async fn setup_db() -> TestDb {
    let dir = tempfile::tempdir().expect("failed to create temp dir");
    let path = dir.path().join("test.db");
    let url = format!("sqlite:{}", path.display());
    let db = DatabaseConnection::new(&url, 5)
        .await
        .expect("failed to open test database");
    db.migrate().await.expect("failed to run migrations");
    TestDb {
        pool: db.pool().clone(),
        _dir: dir,
    }
}

fn now() -> String {
    Utc::now().to_rfc3339()
}

/// Bearer token for a seeded agent.
pub fn token_for(agent_id: i64) -> String {
    format!("csa_{agent_id}_testsecret")
}

pub async fn seed_project(pool: &SqlitePool, id: i64, name: &str) {
    sqlx::query("INSERT INTO projects (id, name, created_at, updated_at) VALUES (?, ?, ?, ?)")
        .bind(id)
        .bind(name)
        .bind(now())
        .bind(now())
        .execute(pool)
        .await
        .expect("seed project");
}

pub async fn seed_agent(pool: &SqlitePool, id: i64, state: &str, project_ids: &[i64]) {
    sqlx::query(
        r"
        INSERT INTO agents (id, name, token, state, devices, last_seen_at, created_at, updated_at)
        VALUES (?, ?, ?, ?, '[]', ?, ?, ?)
        ",
    )
    .bind(id)
    .bind(format!("agent-{id}"))
    .bind(token_for(id))
    .bind(state)
    .bind(now())
    .bind(now())
    .bind(now())
    .execute(pool)
    .await
    .expect("seed agent");

    for project_id in project_ids {
        sqlx::query("INSERT INTO agent_projects (agent_id, project_id) VALUES (?, ?)")
            .bind(id)
            .bind(project_id)
            .execute(pool)
            .await
            .expect("seed agent project");
    }
}

pub async fn seed_benchmark(pool: &SqlitePool, agent_id: i64, hash_type: u32, hash_speed: f64) {
    sqlx::query(
        r"
        INSERT INTO agent_benchmarks (agent_id, device, hash_type, hash_speed, runtime_ms, created_at)
        VALUES (?, 1, ?, ?, 1000, ?)
        ",
    )
    .bind(agent_id)
    .bind(i64::from(hash_type))
    .bind(hash_speed)
    .bind(now())
    .execute(pool)
    .await
    .expect("seed benchmark");
}

pub async fn seed_hash_list(
    pool: &SqlitePool,
    id: i64,
    project_id: i64,
    hash_type_id: u32,
    hashes: &[&str],
) {
    sqlx::query(
        r"
        INSERT INTO hash_lists (id, project_id, name, hash_type_id, uncracked_count, created_at, updated_at)
        VALUES (?, ?, ?, ?, ?, ?, ?)
        ",
    )
    .bind(id)
    .bind(project_id)
    .bind(format!("list-{id}"))
    .bind(i64::from(hash_type_id))
    .bind(i64::try_from(hashes.len()).unwrap())
    .bind(now())
    .bind(now())
    .execute(pool)
    .await
    .expect("seed hash list");

    for hash in hashes {
        sqlx::query(
            r"
            INSERT INTO hash_items (hash_list_id, hash_value, cracked, created_at, updated_at)
            VALUES (?, ?, 0, ?, ?)
            ",
        )
        .bind(id)
        .bind(hash)
        .bind(now())
        .bind(now())
        .execute(pool)
        .await
        .expect("seed hash item");
    }
}

pub async fn seed_campaign(
    pool: &SqlitePool,
    id: i64,
    project_id: i64,
    hash_list_id: i64,
    priority: i64,
) {
    sqlx::query(
        r"
        INSERT INTO campaigns (id, project_id, hash_list_id, name, priority, state, created_at, updated_at)
        VALUES (?, ?, ?, ?, ?, 'active', ?, ?)
        ",
    )
    .bind(id)
    .bind(project_id)
    .bind(hash_list_id)
    .bind(format!("campaign-{id}"))
    .bind(priority)
    .bind(now())
    .bind(now())
    .execute(pool)
    .await
    .expect("seed campaign");
}

pub async fn seed_resource(pool: &SqlitePool, id: i64, kind: &str, key: &str) {
    sqlx::query(
        r"
        INSERT INTO resources (id, name, kind, store_key, checksum, created_at, updated_at)
        VALUES (?, ?, ?, ?, 'deadbeef', ?, ?)
        ",
    )
    .bind(id)
    .bind(format!("resource-{id}"))
    .bind(kind)
    .bind(key)
    .bind(now())
    .bind(now())
    .execute(pool)
    .await
    .expect("seed resource");
}

pub async fn seed_attack(
    pool: &SqlitePool,
    id: i64,
    campaign_id: i64,
    hash_mode: u32,
    complexity: i64,
    state: &str,
) {
    seed_attack_with_word_list(pool, id, campaign_id, hash_mode, complexity, state, None).await;
}

pub async fn seed_attack_with_word_list(
    pool: &SqlitePool,
    id: i64,
    campaign_id: i64,
    hash_mode: u32,
    complexity: i64,
    state: &str,
    word_list_id: Option<i64>,
) {
    sqlx::query(
        r"
        INSERT INTO attacks (id, campaign_id, name, attack_mode, hash_mode, state,
                             mask, complexity_value, word_list_id, created_at, updated_at)
        VALUES (?, ?, ?, 'dictionary', ?, ?, NULL, ?, ?, ?, ?)
        ",
    )
    .bind(id)
    .bind(campaign_id)
    .bind(format!("attack-{id}"))
    .bind(i64::from(hash_mode))
    .bind(state)
    .bind(complexity)
    .bind(word_list_id)
    .bind(now())
    .bind(now())
    .execute(pool)
    .await
    .expect("seed attack");
}

pub async fn seed_task(
    pool: &SqlitePool,
    id: i64,
    attack_id: i64,
    agent_id: i64,
    state: &str,
    progress: f64,
) {
    seed_task_with_activity(pool, id, attack_id, agent_id, state, progress, Some(Utc::now())).await;
}

pub async fn seed_task_with_activity(
    pool: &SqlitePool,
    id: i64,
    attack_id: i64,
    agent_id: i64,
    state: &str,
    progress: f64,
    activity: Option<DateTime<Utc>>,
) {
    sqlx::query(
        r"
        INSERT INTO tasks (id, attack_id, agent_id, state, stale, activity_timestamp,
                           start_date, preemption_count, progress_percent, created_at, updated_at)
        VALUES (?, ?, ?, ?, 0, ?, ?, 0, ?, ?, ?)
        ",
    )
    .bind(id)
    .bind(attack_id)
    .bind(agent_id)
    .bind(state)
    .bind(activity.map(|dt| dt.to_rfc3339()))
    .bind(now())
    .bind(progress)
    .bind(now())
    .bind(now())
    .execute(pool)
    .await
    .expect("seed task");
}

/// Backdate an agent's last heartbeat.
pub async fn age_agent_last_seen(pool: &SqlitePool, agent_id: i64, seconds: i64) {
    let then = (Utc::now() - Duration::seconds(seconds)).to_rfc3339();
    sqlx::query("UPDATE agents SET last_seen_at = ? WHERE id = ?")
        .bind(then)
        .bind(agent_id)
        .execute(pool)
        .await
        .expect("age agent");
}

/// Backdate a task's activity timestamp.
pub async fn age_task_activity(pool: &SqlitePool, task_id: i64, seconds: i64) {
    let then = (Utc::now() - Duration::seconds(seconds)).to_rfc3339();
    sqlx::query("UPDATE tasks SET activity_timestamp = ? WHERE id = ?")
        .bind(then)
        .bind(task_id)
        .execute(pool)
        .await
        .expect("age task");
}

pub async fn task_row(pool: &SqlitePool, id: i64) -> (String, bool, i64) {
    use sqlx::Row;
    let row = sqlx::query("SELECT state, stale, preemption_count FROM tasks WHERE id = ?")
        .bind(id)
        .fetch_one(pool)
        .await
        .expect("task row");
    (
        row.get("state"),
        row.get::<i64, _>("stale") != 0,
        row.get("preemption_count"),
    )
}

pub async fn attack_state(pool: &SqlitePool, id: i64) -> String {
    use sqlx::Row;
    sqlx::query("SELECT state FROM attacks WHERE id = ?")
        .bind(id)
        .fetch_one(pool)
        .await
        .expect("attack state")
        .get("state")
}

pub async fn count_rows(pool: &SqlitePool, sql: &str) -> i64 {
    use sqlx::Row;
    sqlx::query(sql)
        .fetch_one(pool)
        .await
        .expect("count query")
        .get(0)
}
