//! Entity models and state machines.

pub mod agent;
pub mod agent_error;
pub mod attack;
pub mod campaign;
pub mod config;
pub mod hash_list;
pub mod project;
pub mod status;
pub mod task;

pub use agent::{Agent, AgentEvent, AgentState, HashcatBenchmark};
pub use agent_error::{AgentError, Severity};
pub use attack::{Attack, AttackEvent, AttackMode, AttackState};
pub use campaign::{Campaign, CampaignEvent, CampaignPriority, CampaignState};
pub use config::Config;
pub use hash_list::{HashItem, HashList};
pub use project::{Project, Resource, ResourceKind, User};
pub use status::{DeviceStatus, HashcatGuess, HashcatStatus};
pub use task::{Task, TaskEvent, TaskState};
