//! Crack submission and propagation integration tests.

mod common;

use std::sync::Arc;

use chrono::Utc;
use cipherswarm::bootstrap;
use cipherswarm::domain::models::Config;
use cipherswarm::services::{CrackResult, CrackSubmission};
use cipherswarm::CoreError;
use sqlx::Row;

use common::*;

const MD5_PASSWORD: &str = "5f4dcc3b5aa765d61d8327deb882cf99";

fn submission(hash: &str, plain: &str) -> CrackSubmission {
    CrackSubmission {
        hash_value: hash.to_string(),
        plain_text: plain.to_string(),
        timestamp: Utc::now(),
    }
}

/// Two campaigns on two hash lists sharing hash type 0, both containing the
/// same hash, each with a running task from a different agent.
async fn seed_two_list_world(pool: &sqlx::SqlitePool) {
    seed_project(pool, 1, "p1").await;
    seed_agent(pool, 1, "active", &[1]).await;
    seed_agent(pool, 2, "active", &[1]).await;
    seed_benchmark(pool, 1, 0, 50_000.0).await;
    seed_benchmark(pool, 2, 0, 50_000.0).await;

    seed_hash_list(pool, 1, 1, 0, &[MD5_PASSWORD, "aaaa"]).await;
    seed_hash_list(pool, 2, 1, 0, &[MD5_PASSWORD, "bbbb"]).await;
    seed_campaign(pool, 1, 1, 1, 0).await;
    seed_campaign(pool, 2, 1, 2, 0).await;
    seed_attack(pool, 1, 1, 0, 100, "running").await;
    seed_attack(pool, 2, 2, 0, 100, "running").await;
    seed_task(pool, 1, 1, 1, "running", 10.0).await;
    seed_task(pool, 2, 2, 2, "running", 10.0).await;
}

#[tokio::test]
async fn crack_propagates_across_lists_of_same_hash_type() {
    let db = setup_db().await;
    seed_two_list_world(&db.pool).await;
    let app = bootstrap::build(Arc::new(Config::default()), db.pool.clone());

    let result = app
        .state
        .crack
        .submit_crack(1, 1, &submission(MD5_PASSWORD, "password"))
        .await
        .expect("submit");
    assert_eq!(result, CrackResult::Accepted { uncracked_remaining: 1 });

    // Both items cracked with the same plaintext.
    let rows = sqlx::query(
        "SELECT hash_list_id, plain_text, cracked FROM hash_items WHERE hash_value = ? ORDER BY hash_list_id",
    )
    .bind(MD5_PASSWORD)
    .fetch_all(&db.pool)
    .await
    .unwrap();
    assert_eq!(rows.len(), 2);
    for row in &rows {
        assert_eq!(row.get::<i64, _>("cracked"), 1);
        assert_eq!(row.get::<String, _>("plain_text"), "password");
    }

    // Counters updated on both lists.
    assert_eq!(
        count_rows(&db.pool, "SELECT uncracked_count FROM hash_lists WHERE id = 1").await,
        1
    );
    assert_eq!(
        count_rows(&db.pool, "SELECT uncracked_count FROM hash_lists WHERE id = 2").await,
        1
    );

    // The other campaign's task went stale; the submitting one did not.
    let (_, stale_other, _) = task_row(&db.pool, 2).await;
    assert!(stale_other);
    let (_, stale_own, _) = task_row(&db.pool, 1).await;
    assert!(!stale_own);
}

#[tokio::test]
async fn resubmitting_a_cracked_hash_is_idempotent() {
    let db = setup_db().await;
    seed_two_list_world(&db.pool).await;
    let app = bootstrap::build(Arc::new(Config::default()), db.pool.clone());

    app.state
        .crack
        .submit_crack(1, 1, &submission(MD5_PASSWORD, "password"))
        .await
        .unwrap();

    // Second submission succeeds but must not overwrite the plaintext.
    let result = app
        .state
        .crack
        .submit_crack(1, 1, &submission(MD5_PASSWORD, "hunter2"))
        .await
        .expect("idempotent resubmit");
    assert_eq!(result, CrackResult::Accepted { uncracked_remaining: 1 });

    let plain: String = sqlx::query(
        "SELECT plain_text FROM hash_items WHERE hash_list_id = 1 AND hash_value = ?",
    )
    .bind(MD5_PASSWORD)
    .fetch_one(&db.pool)
    .await
    .unwrap()
    .get("plain_text");
    assert_eq!(plain, "password");
}

#[tokio::test]
async fn unknown_hash_is_rejected() {
    let db = setup_db().await;
    seed_two_list_world(&db.pool).await;
    let app = bootstrap::build(Arc::new(Config::default()), db.pool.clone());

    let err = app
        .state
        .crack
        .submit_crack(1, 1, &submission("ffffffffffffffffffffffffffffffff", "nope"))
        .await
        .unwrap_err();
    assert!(matches!(err, CoreError::HashNotFound));
}

#[tokio::test]
async fn cracking_the_last_hash_completes_task_attack_and_campaign() {
    let db = setup_db().await;
    seed_project(&db.pool, 1, "p1").await;
    seed_agent(&db.pool, 1, "active", &[1]).await;
    seed_benchmark(&db.pool, 1, 0, 50_000.0).await;
    seed_hash_list(&db.pool, 1, 1, 0, &[MD5_PASSWORD]).await;
    seed_campaign(&db.pool, 1, 1, 1, 0).await;
    seed_attack(&db.pool, 1, 1, 0, 100, "running").await;
    seed_task(&db.pool, 1, 1, 1, "running", 50.0).await;

    let app = bootstrap::build(Arc::new(Config::default()), db.pool.clone());
    let result = app
        .state
        .crack
        .submit_crack(1, 1, &submission(MD5_PASSWORD, "password"))
        .await
        .expect("submit");
    assert_eq!(result, CrackResult::TaskCompleted);

    let (task_state, _, _) = task_row(&db.pool, 1).await;
    assert_eq!(task_state, "completed");
    assert_eq!(attack_state(&db.pool, 1).await, "completed");
    assert_eq!(
        count_rows(&db.pool, "SELECT COUNT(*) FROM campaigns WHERE id = 1 AND state = 'completed'")
            .await,
        1
    );
}

#[tokio::test]
async fn project_gating_limits_propagation() {
    let db = setup_db().await;
    seed_project(&db.pool, 1, "p1").await;
    seed_project(&db.pool, 2, "p2").await;
    seed_agent(&db.pool, 1, "active", &[1]).await;
    seed_benchmark(&db.pool, 1, 0, 50_000.0).await;
    seed_hash_list(&db.pool, 1, 1, 0, &[MD5_PASSWORD, "aaaa"]).await;
    // Same hash type, different project.
    seed_hash_list(&db.pool, 2, 2, 0, &[MD5_PASSWORD]).await;
    seed_campaign(&db.pool, 1, 1, 1, 0).await;
    seed_attack(&db.pool, 1, 1, 0, 100, "running").await;
    seed_task(&db.pool, 1, 1, 1, "running", 0.0).await;

    let mut config = Config::default();
    config.propagate_within_project_only = true;
    let app = bootstrap::build(Arc::new(config), db.pool.clone());

    app.state
        .crack
        .submit_crack(1, 1, &submission(MD5_PASSWORD, "password"))
        .await
        .unwrap();

    let cracked_other_project: i64 = count_rows(
        &db.pool,
        "SELECT COUNT(*) FROM hash_items WHERE hash_list_id = 2 AND cracked = 1",
    )
    .await;
    assert_eq!(cracked_other_project, 0, "propagation must stay in-project");
}

#[tokio::test]
async fn validation_rejects_empty_plaintext() {
    let db = setup_db().await;
    seed_two_list_world(&db.pool).await;
    let app = bootstrap::build(Arc::new(Config::default()), db.pool.clone());

    let err = app
        .state
        .crack
        .submit_crack(1, 1, &submission(MD5_PASSWORD, ""))
        .await
        .unwrap_err();
    assert!(matches!(err, CoreError::Validation(_)));
}
