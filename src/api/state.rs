//! Shared application state handed to every handler.

use std::sync::Arc;

use crate::domain::models::config::Config;
use crate::domain::ports::{
    AgentRepository, AttackRepository, HashListRepository, ObjectStore, TaskRepository,
};
use crate::services::{
    AgentSessionService, AssignmentService, CrackService, EtaService, HealthService,
    StatusService, TaskFlowService,
};

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub agents: Arc<dyn AgentRepository>,
    pub tasks: Arc<dyn TaskRepository>,
    pub attacks: Arc<dyn AttackRepository>,
    pub hash_lists: Arc<dyn HashListRepository>,
    pub object_store: Arc<dyn ObjectStore>,
    pub assignment: Arc<AssignmentService>,
    pub crack: Arc<CrackService>,
    pub status: Arc<StatusService>,
    pub session: Arc<AgentSessionService>,
    pub task_flow: Arc<TaskFlowService>,
    pub eta: Arc<EtaService>,
    pub health: Arc<HealthService>,
}
