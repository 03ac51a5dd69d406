//! Configuration loader with hierarchical merging.

use anyhow::{Context, Result};
use figment::providers::{Env, Format, Serialized, Yaml};
use figment::Figment;
use thiserror::Error;

use crate::domain::models::config::Config;

/// Configuration error types.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Invalid log level: {0}. Must be one of: trace, debug, info, warn, error")]
    InvalidLogLevel(String),

    #[error("Invalid log format: {0}. Must be one of: json, pretty")]
    InvalidLogFormat(String),

    #[error("Database path cannot be empty")]
    EmptyDatabasePath,

    #[error("Invalid max_connections: {0}. Must be at least 1")]
    InvalidMaxConnections(u32),

    #[error("Invalid agent_offline_seconds: {0}. Must be positive")]
    InvalidOfflineWindow(i64),

    #[error("Invalid task_abandon_seconds: {0}. Must be positive")]
    InvalidAbandonWindow(i64),

    #[error("Invalid n_status_keep: {0}. Must be at least 1")]
    InvalidStatusKeep(u32),

    #[error("Invalid preemption max_progress_percent: {0}. Must be within 0..=100")]
    InvalidMaxProgress(f64),

    #[error("Invalid benchmark threshold for hash mode {0}: {1}. Must be positive")]
    InvalidBenchmarkThreshold(u32, f64),
}

/// Configuration loader.
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load configuration with hierarchical merging.
    ///
    /// Precedence (lowest to highest):
    /// 1. Programmatic defaults
    /// 2. `cipherswarm.yaml` in the working directory
    /// 3. Flat well-known environment keys (`AGENT_OFFLINE_SECONDS`, ...)
    /// 4. `CIPHERSWARM_*` environment variables (`__` nesting split)
    pub fn load() -> Result<Config> {
        Self::figment(Yaml::file("cipherswarm.yaml"))
    }

    /// Load configuration from a specific file.
    pub fn load_from_file(path: impl AsRef<std::path::Path>) -> Result<Config> {
        Self::figment(Yaml::file(path.as_ref()))
    }

    fn figment(file: figment::providers::Data<figment::providers::Yaml>) -> Result<Config> {
        let config: Config = Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(file)
            .merge(Self::flat_env())
            .merge(Env::prefixed("CIPHERSWARM_").split("__"))
            .extract()
            .context("Failed to extract configuration from figment")?;

        Self::validate(&config)?;
        Ok(config)
    }

    /// The flat environment keys from the deployment contract, mapped onto
    /// their nested config locations.
    fn flat_env() -> Env {
        Env::raw()
            .only(&[
                "AGENT_OFFLINE_SECONDS",
                "TASK_ABANDON_SECONDS",
                "N_STATUS_KEEP",
                "HEALTH_TTL_SECONDS",
                "HEALTH_LOCK_SECONDS",
                "RETENTION_AGENT_ERRORS_DAYS",
                "RETENTION_AUDIT_DAYS",
                "RETENTION_STATUS_DAYS",
            ])
            .map(|key| {
                match key.as_str().to_ascii_uppercase().as_str() {
                    "AGENT_OFFLINE_SECONDS" => "limits.agent_offline_seconds".into(),
                    "TASK_ABANDON_SECONDS" => "limits.task_abandon_seconds".into(),
                    "N_STATUS_KEEP" => "limits.n_status_keep".into(),
                    "HEALTH_TTL_SECONDS" => "health.ttl_seconds".into(),
                    "HEALTH_LOCK_SECONDS" => "health.lock_seconds".into(),
                    "RETENTION_AGENT_ERRORS_DAYS" => "retention.agent_errors_days".into(),
                    "RETENTION_AUDIT_DAYS" => "retention.audit_days".into(),
                    "RETENTION_STATUS_DAYS" => "retention.status_days".into(),
                    _ => key.as_str().to_string().into(),
                }
            })
            .split(".")
    }

    /// Validate configuration after loading.
    pub fn validate(config: &Config) -> Result<(), ConfigError> {
        if config.database.path.is_empty() {
            return Err(ConfigError::EmptyDatabasePath);
        }
        if config.database.max_connections == 0 {
            return Err(ConfigError::InvalidMaxConnections(
                config.database.max_connections,
            ));
        }

        let valid_log_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_log_levels.contains(&config.logging.level.as_str()) {
            return Err(ConfigError::InvalidLogLevel(config.logging.level.clone()));
        }
        let valid_log_formats = ["json", "pretty"];
        if !valid_log_formats.contains(&config.logging.format.as_str()) {
            return Err(ConfigError::InvalidLogFormat(config.logging.format.clone()));
        }

        if config.limits.agent_offline_seconds <= 0 {
            return Err(ConfigError::InvalidOfflineWindow(
                config.limits.agent_offline_seconds,
            ));
        }
        if config.limits.task_abandon_seconds <= 0 {
            return Err(ConfigError::InvalidAbandonWindow(
                config.limits.task_abandon_seconds,
            ));
        }
        if config.limits.n_status_keep == 0 {
            return Err(ConfigError::InvalidStatusKeep(config.limits.n_status_keep));
        }

        if !(0.0..=100.0).contains(&config.preemption.max_progress_percent) {
            return Err(ConfigError::InvalidMaxProgress(
                config.preemption.max_progress_percent,
            ));
        }

        for (mode, threshold) in &config.benchmark_thresholds {
            if *threshold <= 0.0 {
                return Err(ConfigError::InvalidBenchmarkThreshold(*mode, *threshold));
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_pass_validation() {
        let config = Config::default();
        assert!(ConfigLoader::validate(&config).is_ok());
    }

    #[test]
    fn empty_database_path_rejected() {
        let mut config = Config::default();
        config.database.path = String::new();
        assert!(matches!(
            ConfigLoader::validate(&config),
            Err(ConfigError::EmptyDatabasePath)
        ));
    }

    #[test]
    fn bad_log_level_rejected() {
        let mut config = Config::default();
        config.logging.level = "verbose".into();
        assert!(matches!(
            ConfigLoader::validate(&config),
            Err(ConfigError::InvalidLogLevel(_))
        ));
    }

    #[test]
    fn zero_status_keep_rejected() {
        let mut config = Config::default();
        config.limits.n_status_keep = 0;
        assert!(matches!(
            ConfigLoader::validate(&config),
            Err(ConfigError::InvalidStatusKeep(0))
        ));
    }

    #[test]
    fn negative_benchmark_threshold_rejected() {
        let mut config = Config::default();
        config.benchmark_thresholds.insert(1000, -1.0);
        assert!(matches!(
            ConfigLoader::validate(&config),
            Err(ConfigError::InvalidBenchmarkThreshold(1000, _))
        ));
    }
}
