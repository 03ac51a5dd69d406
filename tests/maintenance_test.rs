//! Maintenance loop integration tests: offline detection, abandonment,
//! trimming, retention, and counter recounts.

mod common;

use std::sync::Arc;

use chrono::Utc;
use cipherswarm::bootstrap;
use cipherswarm::domain::models::{AgentState, Config};

use common::*;

#[tokio::test]
async fn stale_agents_go_offline_and_recover_via_heartbeat() {
    let db = setup_db().await;
    seed_project(&db.pool, 1, "p1").await;
    seed_agent(&db.pool, 1, "active", &[1]).await;
    seed_benchmark(&db.pool, 1, 1000, 50_000.0).await;
    seed_agent(&db.pool, 2, "active", &[1]).await;
    seed_benchmark(&db.pool, 2, 1000, 50_000.0).await;

    let config = Config::default();
    let offline_after = config.limits.agent_offline_seconds;
    age_agent_last_seen(&db.pool, 1, offline_after + 1).await;

    let app = bootstrap::build(Arc::new(config), db.pool.clone());
    let summary = app.maintenance.run_tick().await;
    assert_eq!(summary.agents_offlined, 1);
    assert_eq!(summary.failures, 0);

    let agent = app.state.agents.get(1).await.unwrap();
    assert_eq!(agent.state, AgentState::Offline);
    let fresh = app.state.agents.get(2).await.unwrap();
    assert_eq!(fresh.state, AgentState::Active);

    // Heartbeat recovers: benchmarks exist, so the agent is promoted
    // straight back to active.
    let state = app.state.session.heartbeat(1).await.unwrap();
    assert_eq!(state, AgentState::Active);
}

#[tokio::test]
async fn offline_agent_without_benchmarks_stays_pending_after_heartbeat() {
    let db = setup_db().await;
    seed_project(&db.pool, 1, "p1").await;
    seed_agent(&db.pool, 1, "offline", &[1]).await;

    let app = bootstrap::build(Arc::new(Config::default()), db.pool.clone());
    let state = app.state.session.heartbeat(1).await.unwrap();
    assert_eq!(state, AgentState::Pending);

    // Once a benchmark lands, the agent is active.
    let state = app
        .state
        .session
        .submit_benchmarks(
            1,
            &[cipherswarm::domain::ports::NewBenchmark {
                device: 1,
                hash_type: 1000,
                hash_speed: 1000.0,
                runtime_ms: 900,
            }],
        )
        .await
        .unwrap();
    assert_eq!(state, AgentState::Active);
}

#[tokio::test]
async fn inactive_running_tasks_are_deleted_and_attack_reopens() {
    let db = setup_db().await;
    seed_project(&db.pool, 1, "p1").await;
    seed_agent(&db.pool, 1, "active", &[1]).await;
    seed_benchmark(&db.pool, 1, 1000, 50_000.0).await;
    seed_hash_list(&db.pool, 1, 1, 1000, &["h0"]).await;
    seed_campaign(&db.pool, 1, 1, 1, 0).await;
    seed_attack(&db.pool, 1, 1, 1000, 100, "running").await;
    seed_task(&db.pool, 1, 1, 1, "running", 10.0).await;

    let config = Config::default();
    age_task_activity(&db.pool, 1, config.limits.task_abandon_seconds + 1).await;

    let app = bootstrap::build(Arc::new(config), db.pool.clone());
    let summary = app.maintenance.run_tick().await;
    assert_eq!(summary.tasks_abandoned, 1);

    assert_eq!(count_rows(&db.pool, "SELECT COUNT(*) FROM tasks").await, 0);
    // With no tasks left running it, the attack returns to the queue.
    assert_eq!(attack_state(&db.pool, 1).await, "pending");
}

#[tokio::test]
async fn statuses_trimmed_to_configured_keep_and_terminal_tasks_emptied() {
    let db = setup_db().await;
    seed_project(&db.pool, 1, "p1").await;
    seed_agent(&db.pool, 1, "active", &[1]).await;
    seed_hash_list(&db.pool, 1, 1, 1000, &["h0"]).await;
    seed_campaign(&db.pool, 1, 1, 1, 0).await;
    seed_attack(&db.pool, 1, 1, 1000, 100, "running").await;
    seed_task(&db.pool, 1, 1, 1, "running", 10.0).await;
    seed_task(&db.pool, 2, 1, 1, "completed", 100.0).await;

    let now = Utc::now().to_rfc3339();
    for task_id in [1_i64, 2] {
        for i in 0..15 {
            sqlx::query(
                r"
                INSERT INTO hashcat_statuses (task_id, session, status, time_start,
                                              progress_done, progress_total, restore_point,
                                              rejected, hashcat_guess, device_statuses, created_at)
                VALUES (?, 'cs', 3, ?, ?, 100, 0, 0, '{}', '[]', ?)
                ",
            )
            .bind(task_id)
            .bind(&now)
            .bind(i)
            .bind(&now)
            .execute(&db.pool)
            .await
            .unwrap();
        }
    }

    let config = Config::default();
    let keep = i64::from(config.limits.n_status_keep);
    let app = bootstrap::build(Arc::new(config), db.pool.clone());
    let summary = app.maintenance.run_tick().await;
    assert_eq!(summary.failures, 0);

    // Running task keeps only the most recent N.
    assert_eq!(
        count_rows(&db.pool, "SELECT COUNT(*) FROM hashcat_statuses WHERE task_id = 1").await,
        keep
    );
    // The retained rows are the newest ones.
    assert_eq!(
        count_rows(
            &db.pool,
            "SELECT MIN(progress_done) FROM hashcat_statuses WHERE task_id = 1",
        )
        .await,
        15 - keep
    );
    // Terminal task loses everything.
    assert_eq!(
        count_rows(&db.pool, "SELECT COUNT(*) FROM hashcat_statuses WHERE task_id = 2").await,
        0
    );
}

#[tokio::test]
async fn retention_prunes_old_errors_and_audit_rows() {
    let db = setup_db().await;
    seed_project(&db.pool, 1, "p1").await;
    seed_agent(&db.pool, 1, "active", &[1]).await;

    let config = Config::default();
    let old_error = (Utc::now() - chrono::Duration::days(config.retention.agent_errors_days + 1))
        .to_rfc3339();
    let old_audit =
        (Utc::now() - chrono::Duration::days(config.retention.audit_days + 1)).to_rfc3339();
    let now = Utc::now().to_rfc3339();

    for created in [&old_error, &now] {
        sqlx::query(
            "INSERT INTO agent_errors (agent_id, severity, message, created_at) VALUES (1, 'info', 'm', ?)",
        )
        .bind(created)
        .execute(&db.pool)
        .await
        .unwrap();
    }
    for created in [&old_audit, &now] {
        sqlx::query(
            r"
            INSERT INTO audit_log (entity_kind, entity_id, event, from_state, to_state, created_at)
            VALUES ('task', 1, 'accept', 'pending', 'running', ?)
            ",
        )
        .bind(created)
        .execute(&db.pool)
        .await
        .unwrap();
    }

    let app = bootstrap::build(Arc::new(config), db.pool.clone());
    let summary = app.maintenance.run_tick().await;
    assert_eq!(summary.errors_pruned, 1);
    assert_eq!(summary.audit_pruned, 1);

    assert_eq!(count_rows(&db.pool, "SELECT COUNT(*) FROM agent_errors").await, 1);
    assert_eq!(count_rows(&db.pool, "SELECT COUNT(*) FROM audit_log").await, 1);
}

#[tokio::test]
async fn drifted_uncracked_counters_are_recounted() {
    let db = setup_db().await;
    seed_project(&db.pool, 1, "p1").await;
    seed_hash_list(&db.pool, 1, 1, 1000, &["h0", "h1", "h2"]).await;
    // Simulate drift.
    sqlx::query("UPDATE hash_lists SET uncracked_count = 99 WHERE id = 1")
        .execute(&db.pool)
        .await
        .unwrap();

    let app = bootstrap::build(Arc::new(Config::default()), db.pool.clone());
    let summary = app.maintenance.run_tick().await;
    assert_eq!(summary.counters_corrected, 1);
    assert_eq!(
        count_rows(&db.pool, "SELECT uncracked_count FROM hash_lists WHERE id = 1").await,
        3
    );
}
