//! Maintenance loop.
//!
//! Runs on a fixed tick: offline detection, task abandonment, status
//! trimming, retention pruning, counter recounts, and rebalancing. Each step
//! runs under its own timeout; a failed step is logged, counted, and never
//! stops the remaining steps.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::watch;
use tokio::time::{interval, timeout, MissedTickBehavior};
use tracing::{info, warn};

use crate::domain::errors::CoreResult;
use crate::domain::models::config::Config;
use crate::domain::models::AttackEvent;
use crate::domain::ports::{
    AgentErrorRepository, AgentRepository, AttackRepository, AuditRepository, HashListRepository,
    StatusRepository, TaskRepository,
};
use crate::services::preemption::PreemptionService;

/// Per-tick result summary.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TickSummary {
    pub agents_offlined: usize,
    pub tasks_abandoned: usize,
    pub statuses_trimmed: u64,
    pub statuses_dropped: u64,
    pub errors_pruned: u64,
    pub audit_pruned: u64,
    pub statuses_pruned: u64,
    pub counters_corrected: usize,
    pub rebalanced: usize,
    pub failures: u32,
}

pub struct MaintenanceService {
    agents: Arc<dyn AgentRepository>,
    tasks: Arc<dyn TaskRepository>,
    attacks: Arc<dyn AttackRepository>,
    statuses: Arc<dyn StatusRepository>,
    errors: Arc<dyn AgentErrorRepository>,
    audit: Arc<dyn AuditRepository>,
    hash_lists: Arc<dyn HashListRepository>,
    preemption: Arc<PreemptionService>,
    config: Arc<Config>,
    last_tick: watch::Sender<Option<DateTime<Utc>>>,
}

impl MaintenanceService {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        agents: Arc<dyn AgentRepository>,
        tasks: Arc<dyn TaskRepository>,
        attacks: Arc<dyn AttackRepository>,
        statuses: Arc<dyn StatusRepository>,
        errors: Arc<dyn AgentErrorRepository>,
        audit: Arc<dyn AuditRepository>,
        hash_lists: Arc<dyn HashListRepository>,
        preemption: Arc<PreemptionService>,
        config: Arc<Config>,
    ) -> (Self, watch::Receiver<Option<DateTime<Utc>>>) {
        let (last_tick, rx) = watch::channel(None);
        (
            Self {
                agents,
                tasks,
                attacks,
                statuses,
                errors,
                audit,
                hash_lists,
                preemption,
                config,
                last_tick,
            },
            rx,
        )
    }

    /// Run until the shutdown signal flips.
    pub async fn run_loop(self: Arc<Self>, mut shutdown: watch::Receiver<bool>) {
        let mut ticker = interval(Duration::from_secs(self.config.maintenance.interval_seconds));
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        info!(
            interval_seconds = self.config.maintenance.interval_seconds,
            "maintenance loop started"
        );

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    let summary = self.run_tick().await;
                    if summary.failures > 0 {
                        warn!(?summary, "maintenance tick finished with failures");
                    } else {
                        info!(?summary, "maintenance tick finished");
                    }
                }
                _ = shutdown.changed() => {
                    if *shutdown.borrow() {
                        info!("maintenance loop stopping");
                        return;
                    }
                }
            }
        }
    }

    /// One full maintenance pass. Public so tests can drive ticks directly.
    pub async fn run_tick(&self) -> TickSummary {
        let step_timeout = Duration::from_secs(self.config.maintenance.step_timeout_seconds);
        let mut summary = TickSummary::default();

        // 1. Offline detection.
        match self
            .step(step_timeout, "offline_detection", self.detect_offline())
            .await
        {
            Some(ids) => summary.agents_offlined = ids.len(),
            None => summary.failures += 1,
        }

        // 2. Abandonment.
        match self
            .step(step_timeout, "abandonment", self.abandon_stuck_tasks())
            .await
        {
            Some(n) => summary.tasks_abandoned = n,
            None => summary.failures += 1,
        }

        // 3. Status trimming.
        match self
            .step(
                step_timeout,
                "status_trim",
                self.statuses.trim_to_recent(self.config.limits.n_status_keep),
            )
            .await
        {
            Some(n) => summary.statuses_trimmed = n,
            None => summary.failures += 1,
        }
        match self
            .step(
                step_timeout,
                "status_terminal_drop",
                self.statuses.delete_for_terminal_tasks(),
            )
            .await
        {
            Some(n) => summary.statuses_dropped = n,
            None => summary.failures += 1,
        }

        // 4. Retention.
        let now = Utc::now();
        match self
            .step(
                step_timeout,
                "error_retention",
                self.errors
                    .delete_older_than(now - chrono::Duration::days(self.config.retention.agent_errors_days)),
            )
            .await
        {
            Some(n) => summary.errors_pruned = n,
            None => summary.failures += 1,
        }
        match self
            .step(
                step_timeout,
                "audit_retention",
                self.audit
                    .delete_older_than(now - chrono::Duration::days(self.config.retention.audit_days)),
            )
            .await
        {
            Some(n) => summary.audit_pruned = n,
            None => summary.failures += 1,
        }
        match self
            .step(
                step_timeout,
                "status_retention",
                self.statuses
                    .delete_older_than(now - chrono::Duration::days(self.config.retention.status_days)),
            )
            .await
        {
            Some(n) => summary.statuses_pruned = n,
            None => summary.failures += 1,
        }

        // 5. Counter recount.
        match self
            .step(step_timeout, "recount", self.hash_lists.recount_uncracked())
            .await
        {
            Some(corrections) => {
                for (id, stored, actual) in &corrections {
                    warn!(hash_list_id = id, stored, actual, "uncracked counter drifted");
                }
                summary.counters_corrected = corrections.len();
            }
            None => summary.failures += 1,
        }

        // 6. Rebalancing.
        match self
            .step(step_timeout, "rebalance", self.rebalance())
            .await
        {
            Some(n) => summary.rebalanced = n,
            None => summary.failures += 1,
        }

        self.last_tick.send_replace(Some(Utc::now()));
        summary
    }

    /// Run one step under the step timeout; failures are logged, not fatal.
    async fn step<T>(
        &self,
        limit: Duration,
        name: &'static str,
        fut: impl std::future::Future<Output = CoreResult<T>>,
    ) -> Option<T> {
        match timeout(limit, fut).await {
            Ok(Ok(value)) => Some(value),
            Ok(Err(err)) => {
                warn!(step = name, error = %err, "maintenance step failed");
                None
            }
            Err(_) => {
                warn!(step = name, "maintenance step timed out");
                None
            }
        }
    }

    async fn detect_offline(&self) -> CoreResult<Vec<i64>> {
        let cutoff = Utc::now() - chrono::Duration::seconds(self.config.limits.agent_offline_seconds);
        let ids = self.agents.mark_offline_before(cutoff).await?;
        for id in &ids {
            info!(agent_id = id, "agent went offline");
        }
        Ok(ids)
    }

    /// Delete running tasks with no recent activity and re-open their
    /// attacks when no other task is still running them.
    async fn abandon_stuck_tasks(&self) -> CoreResult<usize> {
        let cutoff = Utc::now() - chrono::Duration::seconds(self.config.limits.task_abandon_seconds);
        let deleted = self.tasks.delete_abandoned_before(cutoff).await?;
        for (task_id, attack_id) in &deleted {
            info!(task_id, attack_id, "abandoned task deleted");
            if !self.tasks.running_exists_for_attack(*attack_id).await? {
                if let Err(err) = self.attacks.apply_event(*attack_id, AttackEvent::Reset).await {
                    warn!(attack_id, error = %err, "attack re-evaluation failed");
                }
            }
        }
        Ok(deleted.len())
    }

    /// Invoke preemption once for each starved attack of at-least-normal
    /// priority.
    async fn rebalance(&self) -> CoreResult<usize> {
        let mut preempted = 0;
        for candidate in self.attacks.starved_attacks().await? {
            if self.preemption.preempt_for(&candidate).await? {
                preempted += 1;
            }
        }
        Ok(preempted)
    }
}
