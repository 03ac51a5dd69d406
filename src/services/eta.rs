//! ETA calculator.
//!
//! Produces cached completion estimates per campaign. Cache keys carry the
//! campaign's activity fingerprint, so any attack or task update invalidates
//! the entry naturally.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use moka::future::Cache;
use serde::Serialize;
use tracing::instrument;

use crate::domain::errors::CoreResult;
use crate::domain::ports::{AgentRepository, AttackRepository, CampaignRepository, TaskRepository};

/// Upper bound on cache residency; fingerprint churn does the real work.
const ETA_CACHE_TTL_SECS: u64 = 300;

const ETA_CACHE_MAX_CAPACITY: u64 = 10_000;

/// Completion estimates for one campaign.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CampaignEta {
    /// Latest estimated finish across currently-running tasks
    pub current_eta: Option<DateTime<Utc>>,
    /// `current_eta` plus projected time for not-yet-started attacks
    pub total_eta: Option<DateTime<Utc>>,
}

pub struct EtaService {
    campaigns: Arc<dyn CampaignRepository>,
    attacks: Arc<dyn AttackRepository>,
    tasks: Arc<dyn TaskRepository>,
    agents: Arc<dyn AgentRepository>,
    cache: Cache<(i64, String, String), CampaignEta>,
}

impl EtaService {
    pub fn new(
        campaigns: Arc<dyn CampaignRepository>,
        attacks: Arc<dyn AttackRepository>,
        tasks: Arc<dyn TaskRepository>,
        agents: Arc<dyn AgentRepository>,
    ) -> Self {
        let cache = Cache::builder()
            .max_capacity(ETA_CACHE_MAX_CAPACITY)
            .time_to_live(Duration::from_secs(ETA_CACHE_TTL_SECS))
            .build();
        Self {
            campaigns,
            attacks,
            tasks,
            agents,
            cache,
        }
    }

    /// Estimates for a campaign, cached on
    /// `(campaign_id, max(attacks.updated_at), max(tasks.updated_at))`.
    #[instrument(skip(self), err)]
    pub async fn campaign_eta(&self, campaign_id: i64) -> CoreResult<CampaignEta> {
        let (attacks_fp, tasks_fp) = self.campaigns.activity_fingerprint(campaign_id).await?;
        let key = (campaign_id, attacks_fp, tasks_fp);
        if let Some(cached) = self.cache.get(&key).await {
            return Ok(cached);
        }

        let current_eta = self
            .tasks
            .max_estimated_stop_for_campaign(campaign_id)
            .await?;

        // Project pending and paused attacks at the fleet's fastest measured
        // speed for their hash mode.
        let mut projected_secs = 0.0_f64;
        let unstarted = self.attacks.unstarted_for_campaign(campaign_id).await?;
        let has_unstarted = !unstarted.is_empty();
        for (_, hash_mode, complexity) in unstarted {
            if let Some(speed) = self.agents.fleet_fastest_speed(hash_mode).await? {
                if speed > 0.0 {
                    #[allow(clippy::cast_precision_loss)]
                    {
                        projected_secs += complexity as f64 / speed;
                    }
                }
            }
        }

        let total_eta = if current_eta.is_none() && !has_unstarted {
            None
        } else {
            // With only unstarted attacks, anchor the projection on now.
            let anchor = current_eta.unwrap_or_else(Utc::now);
            #[allow(clippy::cast_possible_truncation)]
            Some(anchor + chrono::Duration::seconds(projected_secs.ceil() as i64))
        };

        let eta = CampaignEta {
            current_eta,
            total_eta,
        };
        self.cache.insert(key, eta).await;
        Ok(eta)
    }
}
