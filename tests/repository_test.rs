//! Repository-level integration tests against a migrated SQLite database.

mod common;

use chrono::Utc;
use cipherswarm::domain::models::{
    Agent, AgentEvent, AgentState, CampaignEvent, CampaignPriority, CampaignState,
};
use cipherswarm::domain::ports::{
    AgentProfile, AgentRepository, AuditRepository, CampaignRepository, HashListRepository,
    NewBenchmark, StatusRepository,
};
use cipherswarm::infrastructure::database::{
    AgentRepositoryImpl, AuditRepositoryImpl, CampaignRepositoryImpl, HashListRepositoryImpl,
    StatusRepositoryImpl,
};
use cipherswarm::CoreError;

use common::*;

fn new_agent(token: &str) -> Agent {
    let now = Utc::now();
    Agent {
        id: 0,
        name: "rig-1".into(),
        token: token.into(),
        state: AgentState::Pending,
        client_signature: Some("csa/1.0".into()),
        operating_system: Some("linux".into()),
        devices: vec!["RTX 4090".into()],
        last_seen_at: None,
        created_at: now,
        updated_at: now,
    }
}

#[tokio::test]
async fn agent_insert_lookup_and_profile_update() {
    let db = setup_db().await;
    seed_project(&db.pool, 1, "p1").await;
    let repo = AgentRepositoryImpl::new(db.pool.clone());

    let id = repo.insert(&new_agent("csa_0_bootstrap"), &[1]).await.unwrap();
    assert!(id > 0);

    let found = repo.get_by_token("csa_0_bootstrap").await.unwrap().unwrap();
    assert_eq!(found.id, id);
    assert_eq!(found.devices, vec!["RTX 4090".to_string()]);
    assert!(repo.get_by_token("csa_0_nope").await.unwrap().is_none());
    assert_eq!(repo.project_ids(id).await.unwrap(), vec![1]);

    repo.update_profile(
        id,
        &AgentProfile {
            name: Some("rig-2".into()),
            devices: Some(vec!["RTX 4090".into(), "RTX 4080".into()]),
            ..AgentProfile::default()
        },
    )
    .await
    .unwrap();
    let updated = repo.get(id).await.unwrap();
    assert_eq!(updated.name, "rig-2");
    assert_eq!(updated.devices.len(), 2);
    // Untouched fields survive a partial update.
    assert_eq!(updated.operating_system.as_deref(), Some("linux"));

    let missing = repo.get(9999).await.unwrap_err();
    assert!(matches!(missing, CoreError::NotFound { entity: "agent", .. }));
}

#[tokio::test]
async fn benchmark_replacement_is_atomic_and_audited_transitions_land() {
    let db = setup_db().await;
    seed_project(&db.pool, 1, "p1").await;
    let repo = AgentRepositoryImpl::new(db.pool.clone());
    let audit = AuditRepositoryImpl::new(db.pool.clone());

    let id = repo.insert(&new_agent("csa_0_bench"), &[1]).await.unwrap();
    repo.replace_benchmarks(
        id,
        &[
            NewBenchmark { device: 1, hash_type: 0, hash_speed: 100.0, runtime_ms: 900 },
            NewBenchmark { device: 1, hash_type: 1000, hash_speed: 200.0, runtime_ms: 900 },
        ],
    )
    .await
    .unwrap();
    assert_eq!(repo.benchmarked_hash_types(id).await.unwrap(), vec![0, 1000]);

    // Replacement wipes the previous set.
    repo.replace_benchmarks(
        id,
        &[NewBenchmark { device: 2, hash_type: 1800, hash_speed: 50.0, runtime_ms: 900 }],
    )
    .await
    .unwrap();
    let benchmarks = repo.benchmarks(id).await.unwrap();
    assert_eq!(benchmarks.len(), 1);
    assert_eq!(benchmarks[0].hash_type, 1800);
    assert_eq!(repo.fastest_speed(id, 1800).await.unwrap(), Some(50.0));
    assert_eq!(repo.fastest_speed(id, 0).await.unwrap(), None);

    // State transition writes an audit row.
    let state = repo.apply_event(id, AgentEvent::BenchmarkSubmitted).await.unwrap();
    assert_eq!(state, AgentState::Active);
    let entries = audit.recent(10).await.unwrap();
    let entry = entries
        .iter()
        .find(|e| e.entity_kind == "agent" && e.entity_id == id)
        .expect("agent transition audited");
    assert_eq!(entry.event, "benchmark_submitted");
    assert_eq!(entry.from_state, "pending");
    assert_eq!(entry.to_state, "active");
}

#[tokio::test]
async fn campaign_events_and_invalid_transitions() {
    let db = setup_db().await;
    seed_project(&db.pool, 1, "p1").await;
    seed_hash_list(&db.pool, 1, 1, 0, &["h0"]).await;
    seed_campaign(&db.pool, 1, 1, 1, 2).await;
    let repo = CampaignRepositoryImpl::new(db.pool.clone());

    let campaign = repo.get(1).await.unwrap();
    assert_eq!(campaign.priority, CampaignPriority::High);
    assert_eq!(campaign.state, CampaignState::Active);

    assert_eq!(
        repo.apply_event(1, CampaignEvent::Pause).await.unwrap(),
        CampaignState::Paused
    );
    assert_eq!(
        repo.apply_event(1, CampaignEvent::Activate).await.unwrap(),
        CampaignState::Active
    );
    repo.apply_event(1, CampaignEvent::Complete).await.unwrap();

    let err = repo.apply_event(1, CampaignEvent::Activate).await.unwrap_err();
    assert!(matches!(err, CoreError::InvalidTransition { entity: "campaign", .. }));
}

#[tokio::test]
async fn status_round_trips_guess_and_devices() {
    let db = setup_db().await;
    seed_project(&db.pool, 1, "p1").await;
    seed_agent(&db.pool, 1, "active", &[1]).await;
    seed_hash_list(&db.pool, 1, 1, 0, &["h0"]).await;
    seed_campaign(&db.pool, 1, 1, 1, 0).await;
    seed_attack(&db.pool, 1, 1, 0, 10, "running").await;
    seed_task(&db.pool, 1, 1, 1, "running", 0.0).await;
    let repo = StatusRepositoryImpl::new(db.pool.clone());

    let status = cipherswarm::domain::models::HashcatStatus {
        id: 0,
        task_id: 1,
        session: "cs_1".into(),
        status: 3,
        time_start: Utc::now(),
        estimated_stop: None,
        progress_done: 42,
        progress_total: 100,
        restore_point: 7,
        rejected: 2,
        guess: cipherswarm::domain::models::HashcatGuess {
            guess_base: Some("rockyou.txt".into()),
            guess_base_count: 1,
            guess_base_offset: 0,
            guess_base_percentage: 12.5,
            guess_mod: None,
            guess_mod_count: 0,
            guess_mod_offset: 0,
            guess_mod_percentage: 0.0,
            guess_mode: 0,
        },
        devices: vec![cipherswarm::domain::models::DeviceStatus {
            device_id: 1,
            device_name: "GPU0".into(),
            device_type: "GPU".into(),
            speed: 123_456,
            utilization: 90,
            temperature: 55,
        }],
        created_at: Utc::now(),
    };
    repo.insert(&status).await.unwrap();

    let stored = repo.latest_for_task(1).await.unwrap().expect("status stored");
    assert_eq!(stored.progress_done, 42);
    assert_eq!(stored.restore_point, 7);
    assert_eq!(stored.guess.guess_base.as_deref(), Some("rockyou.txt"));
    assert_eq!(stored.devices.len(), 1);
    assert_eq!(stored.devices[0].speed, 123_456);
}

#[tokio::test]
async fn hash_list_find_item_and_pages() {
    let db = setup_db().await;
    seed_project(&db.pool, 1, "p1").await;
    seed_hash_list(&db.pool, 1, 1, 0, &["h0", "h1", "h2"]).await;
    let repo = HashListRepositoryImpl::new(db.pool.clone());

    let list = repo.get(1).await.unwrap();
    assert_eq!(list.uncracked_count, 3);
    assert_eq!(list.hash_type_id, 0);

    let item = repo.find_item(1, "h1").await.unwrap().expect("item exists");
    assert!(!item.cracked);
    assert!(repo.find_item(1, "nope").await.unwrap().is_none());

    // Paging walks the whole list in id order.
    let first = repo.uncracked_page(1, 0, 2).await.unwrap();
    assert_eq!(first.len(), 2);
    let rest = repo.uncracked_page(1, first.last().unwrap().0, 2).await.unwrap();
    assert_eq!(rest.len(), 1);
    assert_eq!(rest[0].1, "h2");
}
