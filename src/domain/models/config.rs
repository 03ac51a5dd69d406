//! Typed configuration, constructed once at startup and passed down.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// Main configuration for the control plane.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct Config {
    /// HTTP server configuration
    #[serde(default)]
    pub server: ServerConfig,

    /// Database configuration
    #[serde(default)]
    pub database: DatabaseConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Liveness and retention windows
    #[serde(default)]
    pub limits: LimitsConfig,

    /// System-health probe cache and lock
    #[serde(default)]
    pub health: HealthConfig,

    /// Maintenance loop cadence
    #[serde(default)]
    pub maintenance: MaintenanceConfig,

    /// Row retention windows
    #[serde(default)]
    pub retention: RetentionConfig,

    /// Preemption fairness knobs
    #[serde(default)]
    pub preemption: PreemptionConfig,

    /// Minimum benchmark speed per hash mode; modes absent from the map have
    /// no floor beyond requiring a benchmark to exist
    #[serde(default)]
    pub benchmark_thresholds: HashMap<u32, f64>,

    /// Gate crack propagation to hash lists of the same project
    #[serde(default)]
    pub propagate_within_project_only: bool,

    /// Object store the agents download resources from
    #[serde(default)]
    pub object_store: ObjectStoreConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            database: DatabaseConfig::default(),
            logging: LoggingConfig::default(),
            limits: LimitsConfig::default(),
            health: HealthConfig::default(),
            maintenance: MaintenanceConfig::default(),
            retention: RetentionConfig::default(),
            preemption: PreemptionConfig::default(),
            benchmark_thresholds: HashMap::new(),
            propagate_within_project_only: false,
            object_store: ObjectStoreConfig::default(),
        }
    }
}

/// HTTP server configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct ServerConfig {
    #[serde(default = "default_bind_address")]
    pub bind_address: String,
}

fn default_bind_address() -> String {
    "127.0.0.1:8080".to_string()
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: default_bind_address(),
        }
    }
}

/// Database configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct DatabaseConfig {
    /// Path to the SQLite database file
    #[serde(default = "default_database_path")]
    pub path: String,

    /// Maximum number of pooled connections
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

fn default_database_path() -> String {
    "cipherswarm.db".to_string()
}

const fn default_max_connections() -> u32 {
    10
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_database_path(),
            max_connections: default_max_connections(),
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct LoggingConfig {
    /// trace | debug | info | warn | error
    #[serde(default = "default_log_level")]
    pub level: String,

    /// json | pretty
    #[serde(default = "default_log_format")]
    pub format: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "pretty".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

/// Liveness windows and per-task bounds.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct LimitsConfig {
    /// Seconds without a heartbeat before an agent goes offline
    #[serde(default = "default_agent_offline_seconds")]
    pub agent_offline_seconds: i64,

    /// Seconds without task activity before a running task is abandoned
    #[serde(default = "default_task_abandon_seconds")]
    pub task_abandon_seconds: i64,

    /// Most recent status rows retained per pending/running task
    #[serde(default = "default_n_status_keep")]
    pub n_status_keep: u32,

    /// Interval agents are told to poll at
    #[serde(default = "default_agent_update_interval")]
    pub agent_update_interval_seconds: u32,
}

const fn default_agent_offline_seconds() -> i64 {
    120
}

const fn default_task_abandon_seconds() -> i64 {
    1800
}

const fn default_n_status_keep() -> u32 {
    10
}

const fn default_agent_update_interval() -> u32 {
    30
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            agent_offline_seconds: default_agent_offline_seconds(),
            task_abandon_seconds: default_task_abandon_seconds(),
            n_status_keep: default_n_status_keep(),
            agent_update_interval_seconds: default_agent_update_interval(),
        }
    }
}

/// System-health probe cache and single-flight lock.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct HealthConfig {
    #[serde(default = "default_health_ttl_seconds")]
    pub ttl_seconds: u64,

    #[serde(default = "default_health_lock_seconds")]
    pub lock_seconds: u64,

    /// Hard timeout for each individual probe
    #[serde(default = "default_probe_timeout_seconds")]
    pub probe_timeout_seconds: u64,
}

const fn default_health_ttl_seconds() -> u64 {
    60
}

const fn default_health_lock_seconds() -> u64 {
    10
}

const fn default_probe_timeout_seconds() -> u64 {
    5
}

impl Default for HealthConfig {
    fn default() -> Self {
        Self {
            ttl_seconds: default_health_ttl_seconds(),
            lock_seconds: default_health_lock_seconds(),
            probe_timeout_seconds: default_probe_timeout_seconds(),
        }
    }
}

/// Maintenance loop cadence.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct MaintenanceConfig {
    #[serde(default = "default_maintenance_interval_seconds")]
    pub interval_seconds: u64,

    /// Per-step timeout; a step that exceeds it is logged and skipped
    #[serde(default = "default_step_timeout_seconds")]
    pub step_timeout_seconds: u64,
}

const fn default_maintenance_interval_seconds() -> u64 {
    30
}

const fn default_step_timeout_seconds() -> u64 {
    20
}

impl Default for MaintenanceConfig {
    fn default() -> Self {
        Self {
            interval_seconds: default_maintenance_interval_seconds(),
            step_timeout_seconds: default_step_timeout_seconds(),
        }
    }
}

/// Row retention windows, enforced by the maintenance loop.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct RetentionConfig {
    #[serde(default = "default_agent_errors_days")]
    pub agent_errors_days: i64,

    #[serde(default = "default_audit_days")]
    pub audit_days: i64,

    #[serde(default = "default_status_days")]
    pub status_days: i64,
}

const fn default_agent_errors_days() -> i64 {
    30
}

const fn default_audit_days() -> i64 {
    90
}

const fn default_status_days() -> i64 {
    7
}

impl Default for RetentionConfig {
    fn default() -> Self {
        Self {
            agent_errors_days: default_agent_errors_days(),
            audit_days: default_audit_days(),
            status_days: default_status_days(),
        }
    }
}

/// Preemption fairness knobs.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct PreemptionConfig {
    /// Tasks at or above this progress are not preemptable
    #[serde(default = "default_max_progress_percent")]
    pub max_progress_percent: f64,

    /// Tasks preempted this many times are no longer preemptable
    #[serde(default = "default_starvation_cap")]
    pub starvation_cap: u32,
}

fn default_max_progress_percent() -> f64 {
    90.0
}

const fn default_starvation_cap() -> u32 {
    3
}

impl Default for PreemptionConfig {
    fn default() -> Self {
        Self {
            max_progress_percent: default_max_progress_percent(),
            starvation_cap: default_starvation_cap(),
        }
    }
}

/// Object store agents download resources and lists from.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct ObjectStoreConfig {
    /// Base endpoint presigned URLs are built from
    #[serde(default = "default_object_store_endpoint")]
    pub endpoint: String,

    #[serde(default = "default_bucket")]
    pub bucket: String,

    /// Lifetime baked into presigned URLs
    #[serde(default = "default_url_ttl_seconds")]
    pub url_ttl_seconds: u64,
}

fn default_object_store_endpoint() -> String {
    "http://127.0.0.1:9000".to_string()
}

fn default_bucket() -> String {
    "cipherswarm".to_string()
}

const fn default_url_ttl_seconds() -> u64 {
    3600
}

impl Default for ObjectStoreConfig {
    fn default() -> Self {
        Self {
            endpoint: default_object_store_endpoint(),
            bucket: default_bucket(),
            url_ttl_seconds: default_url_ttl_seconds(),
        }
    }
}
