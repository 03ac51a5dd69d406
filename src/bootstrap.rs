//! Wiring: repositories, services, and application state from a pool and a
//! config. Shared by the server binary and the integration tests.

use std::sync::Arc;
use std::time::Duration;

use sqlx::SqlitePool;

use crate::api::AppState;
use crate::domain::models::config::Config;
use crate::domain::ports::{
    AgentErrorRepository, AgentRepository, AttackRepository, AuditRepository, CampaignRepository,
    CrackerRepository, HashListRepository, ObjectStore, StatusRepository, TaskRepository,
};
use crate::infrastructure::cache::AgentCapabilityCache;
use crate::infrastructure::database::{
    AgentErrorRepositoryImpl, AgentRepositoryImpl, AttackRepositoryImpl, AuditRepositoryImpl,
    CampaignRepositoryImpl, CrackerRepositoryImpl, HashListRepositoryImpl, StatusRepositoryImpl,
    TaskRepositoryImpl,
};
use crate::infrastructure::object_store::HttpObjectStore;
use crate::services::{
    AgentSessionService, AssignmentService, CrackService, EtaService, HealthService,
    MaintenanceService, PreemptionService, StatusService, TaskFlowService,
};

/// A fully wired application.
pub struct App {
    pub state: AppState,
    pub maintenance: Arc<MaintenanceService>,
}

/// Assemble repositories and services over the given pool.
pub fn build(config: Arc<Config>, pool: SqlitePool) -> App {
    let agents: Arc<dyn AgentRepository> = Arc::new(AgentRepositoryImpl::new(pool.clone()));
    let tasks: Arc<dyn TaskRepository> = Arc::new(TaskRepositoryImpl::new(pool.clone()));
    let campaigns: Arc<dyn CampaignRepository> =
        Arc::new(CampaignRepositoryImpl::new(pool.clone()));
    let attacks: Arc<dyn AttackRepository> = Arc::new(AttackRepositoryImpl::new(pool.clone()));
    let hash_lists: Arc<dyn HashListRepository> =
        Arc::new(HashListRepositoryImpl::new(pool.clone()));
    let statuses: Arc<dyn StatusRepository> = Arc::new(StatusRepositoryImpl::new(pool.clone()));
    let errors: Arc<dyn AgentErrorRepository> =
        Arc::new(AgentErrorRepositoryImpl::new(pool.clone()));
    let audit: Arc<dyn AuditRepository> = Arc::new(AuditRepositoryImpl::new(pool.clone()));
    let crackers: Arc<dyn CrackerRepository> = Arc::new(CrackerRepositoryImpl::new(pool.clone()));
    let object_store: Arc<dyn ObjectStore> =
        Arc::new(HttpObjectStore::new(config.object_store.clone()));

    let capabilities = Arc::new(AgentCapabilityCache::new());
    let preemption = Arc::new(PreemptionService::new(
        agents.clone(),
        tasks.clone(),
        config.preemption.clone(),
    ));

    let (maintenance, last_tick) = MaintenanceService::new(
        agents.clone(),
        tasks.clone(),
        attacks.clone(),
        statuses.clone(),
        errors.clone(),
        audit.clone(),
        hash_lists.clone(),
        preemption.clone(),
        config.clone(),
    );
    let maintenance = Arc::new(maintenance);

    let assignment = Arc::new(AssignmentService::new(
        agents.clone(),
        tasks.clone(),
        campaigns.clone(),
        attacks.clone(),
        hash_lists.clone(),
        errors.clone(),
        capabilities.clone(),
        preemption.clone(),
        config.benchmark_thresholds.clone(),
    ));
    let crack = Arc::new(CrackService::new(
        tasks.clone(),
        attacks.clone(),
        campaigns.clone(),
        hash_lists.clone(),
        config.propagate_within_project_only,
    ));
    let status = Arc::new(StatusService::new(
        tasks.clone(),
        attacks.clone(),
        statuses.clone(),
    ));
    let session = Arc::new(AgentSessionService::new(
        agents.clone(),
        tasks.clone(),
        errors.clone(),
        crackers.clone(),
        capabilities.clone(),
    ));
    let task_flow = Arc::new(TaskFlowService::new(
        tasks.clone(),
        attacks.clone(),
        campaigns.clone(),
    ));
    let eta = Arc::new(EtaService::new(
        campaigns.clone(),
        attacks.clone(),
        tasks.clone(),
        agents.clone(),
    ));
    let health = Arc::new(HealthService::new(
        pool,
        capabilities,
        object_store.clone(),
        last_tick,
        Duration::from_secs(config.maintenance.interval_seconds),
        &config.health,
    ));

    App {
        state: AppState {
            config,
            agents,
            tasks,
            attacks,
            hash_lists,
            object_store,
            assignment,
            crack,
            status,
            session,
            task_flow,
            eta,
            health,
        },
        maintenance,
    }
}
