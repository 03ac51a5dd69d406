//! ETA calculator integration tests.

mod common;

use std::sync::Arc;

use chrono::{Duration, Utc};
use cipherswarm::bootstrap;
use cipherswarm::domain::models::Config;

use common::*;

async fn insert_status_with_eta(
    pool: &sqlx::SqlitePool,
    task_id: i64,
    estimated_stop: chrono::DateTime<Utc>,
) {
    let now = Utc::now().to_rfc3339();
    sqlx::query(
        r"
        INSERT INTO hashcat_statuses (task_id, session, status, time_start, estimated_stop,
                                      progress_done, progress_total, restore_point, rejected,
                                      hashcat_guess, device_statuses, created_at)
        VALUES (?, 'cs', 3, ?, ?, 10, 100, 0, 0, '{}', '[]', ?)
        ",
    )
    .bind(task_id)
    .bind(&now)
    .bind(estimated_stop.to_rfc3339())
    .bind(&now)
    .execute(pool)
    .await
    .unwrap();
}

#[tokio::test]
async fn current_eta_is_latest_estimated_stop_of_running_tasks() {
    let db = setup_db().await;
    seed_project(&db.pool, 1, "p1").await;
    seed_agent(&db.pool, 1, "active", &[1]).await;
    seed_agent(&db.pool, 2, "active", &[1]).await;
    seed_benchmark(&db.pool, 1, 1000, 1000.0).await;
    seed_benchmark(&db.pool, 2, 1000, 1000.0).await;
    seed_hash_list(&db.pool, 1, 1, 1000, &["h0", "h1"]).await;
    seed_campaign(&db.pool, 1, 1, 1, 0).await;
    seed_attack(&db.pool, 1, 1, 1000, 100, "running").await;
    seed_task(&db.pool, 1, 1, 1, "running", 10.0).await;
    seed_task(&db.pool, 2, 1, 2, "running", 60.0).await;

    let near = Utc::now() + Duration::minutes(10);
    let far = Utc::now() + Duration::hours(2);
    insert_status_with_eta(&db.pool, 1, far).await;
    insert_status_with_eta(&db.pool, 2, near).await;

    let app = bootstrap::build(Arc::new(Config::default()), db.pool.clone());
    let eta = app.state.eta.campaign_eta(1).await.unwrap();

    let current = eta.current_eta.expect("running tasks yield a current eta");
    assert_eq!(current.timestamp(), far.timestamp(), "max across tasks wins");
    // No unstarted attacks: total anchors on current.
    assert_eq!(eta.total_eta.unwrap().timestamp(), far.timestamp());
}

#[tokio::test]
async fn total_eta_adds_projected_time_for_unstarted_attacks() {
    let db = setup_db().await;
    seed_project(&db.pool, 1, "p1").await;
    seed_agent(&db.pool, 1, "active", &[1]).await;
    // Fleet's fastest speed for mode 1000 is 1000 guesses/sec.
    seed_benchmark(&db.pool, 1, 1000, 1000.0).await;
    seed_hash_list(&db.pool, 1, 1, 1000, &["h0"]).await;
    seed_campaign(&db.pool, 1, 1, 1, 0).await;
    // One pending attack with a 3,600,000-guess keyspace: one hour of work.
    seed_attack(&db.pool, 1, 1, 1000, 3_600_000, "pending").await;

    let app = bootstrap::build(Arc::new(Config::default()), db.pool.clone());
    let before = Utc::now();
    let eta = app.state.eta.campaign_eta(1).await.unwrap();

    assert!(eta.current_eta.is_none(), "nothing is running");
    let total = eta.total_eta.expect("pending attacks project a total eta");
    let projected = (total - before).num_seconds();
    assert!(
        (3595..=3610).contains(&projected),
        "expected ~3600s of projected work, got {projected}s"
    );
}

#[tokio::test]
async fn campaign_with_no_work_has_no_eta() {
    let db = setup_db().await;
    seed_project(&db.pool, 1, "p1").await;
    seed_hash_list(&db.pool, 1, 1, 1000, &["h0"]).await;
    seed_campaign(&db.pool, 1, 1, 1, 0).await;
    seed_attack(&db.pool, 1, 1, 1000, 100, "completed").await;

    let app = bootstrap::build(Arc::new(Config::default()), db.pool.clone());
    let eta = app.state.eta.campaign_eta(1).await.unwrap();
    assert!(eta.current_eta.is_none());
    assert!(eta.total_eta.is_none());
}
