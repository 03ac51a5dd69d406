//! System-health probe with single-flight stampede protection.
//!
//! Probe results cache for a TTL. When the cache is cold, exactly one caller
//! acquires a token lock and runs the probes; everyone else gets the cached
//! value or a `checking` placeholder. Release is compare-and-delete against
//! the token, so an expired holder can never release a successor's lock.

use std::sync::Mutex;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use moka::future::Cache;
use serde::Serialize;
use sqlx::SqlitePool;
use std::sync::Arc;
use tokio::sync::watch;
use tokio::time::timeout;
use uuid::Uuid;

use crate::domain::models::config::HealthConfig;
use crate::domain::ports::ObjectStore;
use crate::infrastructure::cache::AgentCapabilityCache;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ProbeStatus {
    Healthy,
    Unhealthy,
    Checking,
}

/// Outcome of one subsystem probe.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProbeResult {
    pub status: ProbeStatus,
    pub latency_ms: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ProbeResult {
    fn checking() -> Self {
        Self {
            status: ProbeStatus::Checking,
            latency_ms: None,
            error: None,
        }
    }
}

/// Snapshot of all four subsystem probes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HealthReport {
    pub status: ProbeStatus,
    pub store: ProbeResult,
    pub cache: ProbeResult,
    pub object_store: ProbeResult,
    pub background_queue: ProbeResult,
    pub checked_at: DateTime<Utc>,
}

impl HealthReport {
    fn checking() -> Self {
        Self {
            status: ProbeStatus::Checking,
            store: ProbeResult::checking(),
            cache: ProbeResult::checking(),
            object_store: ProbeResult::checking(),
            background_queue: ProbeResult::checking(),
            checked_at: Utc::now(),
        }
    }
}

/// Atomic set-if-absent lock with expiry, keyed by a random token.
struct TokenLock {
    inner: Mutex<Option<(Uuid, Instant)>>,
    ttl: Duration,
}

impl TokenLock {
    fn new(ttl: Duration) -> Self {
        Self {
            inner: Mutex::new(None),
            ttl,
        }
    }

    /// Acquire if free or expired; returns the holder token.
    fn try_acquire(&self) -> Option<Uuid> {
        let mut guard = self.inner.lock().expect("health lock poisoned");
        match *guard {
            Some((_, expires)) if expires > Instant::now() => None,
            _ => {
                let token = Uuid::new_v4();
                *guard = Some((token, Instant::now() + self.ttl));
                Some(token)
            }
        }
    }

    /// Compare-and-delete: only the matching token releases the lock.
    fn release(&self, token: Uuid) {
        let mut guard = self.inner.lock().expect("health lock poisoned");
        if let Some((held, _)) = *guard {
            if held == token {
                *guard = None;
            }
        }
    }
}

pub struct HealthService {
    pool: SqlitePool,
    capability_cache: Arc<AgentCapabilityCache>,
    object_store: Arc<dyn ObjectStore>,
    last_tick: watch::Receiver<Option<DateTime<Utc>>>,
    maintenance_interval: Duration,
    probe_timeout: Duration,
    cache: Cache<(), HealthReport>,
    lock: TokenLock,
}

impl HealthService {
    pub fn new(
        pool: SqlitePool,
        capability_cache: Arc<AgentCapabilityCache>,
        object_store: Arc<dyn ObjectStore>,
        last_tick: watch::Receiver<Option<DateTime<Utc>>>,
        maintenance_interval: Duration,
        config: &HealthConfig,
    ) -> Self {
        let cache = Cache::builder()
            .max_capacity(1)
            .time_to_live(Duration::from_secs(config.ttl_seconds))
            .build();
        Self {
            pool,
            capability_cache,
            object_store,
            last_tick,
            maintenance_interval,
            probe_timeout: Duration::from_secs(config.probe_timeout_seconds),
            cache,
            lock: TokenLock::new(Duration::from_secs(config.lock_seconds)),
        }
    }

    /// Cached health snapshot; cold-cache callers race for the probe lock and
    /// losers receive a `checking` placeholder.
    pub async fn system_health(&self) -> HealthReport {
        if let Some(report) = self.cache.get(&()).await {
            return report;
        }

        let Some(token) = self.lock.try_acquire() else {
            // Another caller is probing right now.
            if let Some(report) = self.cache.get(&()).await {
                return report;
            }
            return HealthReport::checking();
        };

        // A finished holder may have filled the cache between our miss and
        // the acquire; don't probe twice.
        if let Some(report) = self.cache.get(&()).await {
            self.lock.release(token);
            return report;
        }

        let report = self.probe_all().await;
        self.cache.insert((), report.clone()).await;
        self.lock.release(token);
        report
    }

    async fn probe_all(&self) -> HealthReport {
        let store = self.probe_store().await;
        let cache = self.probe_cache().await;
        let object_store = self.probe_object_store().await;
        let background_queue = self.probe_background_queue();

        let all_healthy = [&store, &cache, &object_store, &background_queue]
            .iter()
            .all(|p| p.status == ProbeStatus::Healthy);

        HealthReport {
            status: if all_healthy {
                ProbeStatus::Healthy
            } else {
                ProbeStatus::Unhealthy
            },
            store,
            cache,
            object_store,
            background_queue,
            checked_at: Utc::now(),
        }
    }

    async fn probe_store(&self) -> ProbeResult {
        let started = Instant::now();
        let result = timeout(
            self.probe_timeout,
            sqlx::query("SELECT 1").fetch_one(&self.pool),
        )
        .await;
        Self::classify(started, match result {
            Ok(Ok(_)) => None,
            Ok(Err(e)) => Some(e.to_string()),
            Err(_) => Some("store probe timed out".into()),
        })
    }

    async fn probe_cache(&self) -> ProbeResult {
        let started = Instant::now();
        let result = timeout(self.probe_timeout, self.capability_cache.probe()).await;
        Self::classify(started, match result {
            Ok(true) => None,
            Ok(false) => Some("cache round-trip failed".into()),
            Err(_) => Some("cache probe timed out".into()),
        })
    }

    async fn probe_object_store(&self) -> ProbeResult {
        let started = Instant::now();
        let result = timeout(self.probe_timeout, self.object_store.health()).await;
        Self::classify(started, match result {
            Ok(Ok(())) => None,
            Ok(Err(e)) => Some(e.to_string()),
            Err(_) => Some("object store probe timed out".into()),
        })
    }

    /// The maintenance loop is healthy while its last tick is fresher than
    /// three intervals.
    fn probe_background_queue(&self) -> ProbeResult {
        let started = Instant::now();
        let last_tick = *self.last_tick.borrow();
        let error = match last_tick {
            None => Some("maintenance loop has not ticked yet".to_string()),
            Some(at) => {
                let age = Utc::now().signed_duration_since(at);
                let limit = chrono::Duration::from_std(self.maintenance_interval * 3)
                    .unwrap_or_else(|_| chrono::Duration::seconds(90));
                if age > limit {
                    Some(format!("last maintenance tick {}s ago", age.num_seconds()))
                } else {
                    None
                }
            }
        };
        Self::classify(started, error)
    }

    fn classify(started: Instant, error: Option<String>) -> ProbeResult {
        let latency_ms = u64::try_from(started.elapsed().as_millis()).ok();
        match error {
            None => ProbeResult {
                status: ProbeStatus::Healthy,
                latency_ms,
                error: None,
            },
            Some(error) => ProbeResult {
                status: ProbeStatus::Unhealthy,
                latency_ms,
                error: Some(error),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn token_lock_single_holder() {
        let lock = TokenLock::new(Duration::from_secs(10));
        let token = lock.try_acquire().expect("first acquire succeeds");
        assert!(lock.try_acquire().is_none(), "second acquire must fail");
        lock.release(token);
        assert!(lock.try_acquire().is_some(), "released lock reacquires");
    }

    #[test]
    fn token_lock_expiry_allows_takeover() {
        let lock = TokenLock::new(Duration::from_millis(30));
        let stale = lock.try_acquire().expect("first acquire succeeds");
        std::thread::sleep(Duration::from_millis(50));

        // Expired, so a second caller can take over.
        let fresh = lock.try_acquire().expect("expired lock is reacquirable");
        // The stale holder must not release the new holder's lock.
        lock.release(stale);
        assert!(lock.try_acquire().is_none(), "fresh lock still held");
        lock.release(fresh);
        assert!(lock.try_acquire().is_some());
    }
}
