//! Campaign domain model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::errors::CoreError;

/// Scheduling priority of a campaign.
///
/// High always precedes normal, normal always precedes deferred. Deferred
/// campaigns never trigger preemption on their behalf.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CampaignPriority {
    Deferred,
    Normal,
    High,
}

impl Default for CampaignPriority {
    fn default() -> Self {
        Self::Normal
    }
}

impl CampaignPriority {
    /// Stored numeric representation.
    pub fn as_i64(&self) -> i64 {
        match self {
            Self::Deferred => -1,
            Self::Normal => 0,
            Self::High => 2,
        }
    }

    pub fn from_i64(v: i64) -> Option<Self> {
        match v {
            -1 => Some(Self::Deferred),
            0 => Some(Self::Normal),
            2 => Some(Self::High),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Deferred => "deferred",
            Self::Normal => "normal",
            Self::High => "high",
        }
    }
}

/// State of a campaign, derived from its attacks plus explicit events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CampaignState {
    Active,
    Paused,
    Completed,
}

impl Default for CampaignState {
    fn default() -> Self {
        Self::Active
    }
}

/// Explicit campaign events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CampaignEvent {
    Activate,
    Pause,
    Complete,
}

impl CampaignEvent {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Activate => "activate",
            Self::Pause => "pause",
            Self::Complete => "complete",
        }
    }
}

impl CampaignState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Paused => "paused",
            Self::Completed => "completed",
        }
    }

    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "active" => Some(Self::Active),
            "paused" => Some(Self::Paused),
            "completed" | "complete" => Some(Self::Completed),
            _ => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed)
    }

    pub fn apply(&self, event: CampaignEvent) -> Result<CampaignState, CoreError> {
        use CampaignEvent as E;
        use CampaignState as S;

        let next = match (self, event) {
            (S::Paused | S::Active, E::Activate) => S::Active,
            (S::Active | S::Paused, E::Pause) => S::Paused,
            (S::Active | S::Completed, E::Complete) => S::Completed,
            (from, event) => {
                return Err(CoreError::InvalidTransition {
                    entity: "campaign",
                    from: from.as_str(),
                    event: event.as_str(),
                })
            }
        };
        Ok(next)
    }
}

/// A named, prioritized workload within a project. All of a campaign's
/// attacks target the campaign's single hash list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Campaign {
    pub id: i64,
    pub project_id: i64,
    pub hash_list_id: i64,
    pub name: String,
    pub priority: CampaignPriority,
    pub state: CampaignState,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn priority_ordering() {
        assert!(CampaignPriority::High > CampaignPriority::Normal);
        assert!(CampaignPriority::Normal > CampaignPriority::Deferred);
        assert!(CampaignPriority::High.as_i64() > CampaignPriority::Normal.as_i64());
        assert!(CampaignPriority::Normal.as_i64() > CampaignPriority::Deferred.as_i64());
    }

    #[test]
    fn priority_round_trips_through_i64() {
        for p in [
            CampaignPriority::Deferred,
            CampaignPriority::Normal,
            CampaignPriority::High,
        ] {
            assert_eq!(CampaignPriority::from_i64(p.as_i64()), Some(p));
        }
        assert_eq!(CampaignPriority::from_i64(1), None);
    }

    #[test]
    fn pause_and_activate() {
        let paused = CampaignState::Active.apply(CampaignEvent::Pause).unwrap();
        assert_eq!(paused, CampaignState::Paused);
        assert_eq!(
            paused.apply(CampaignEvent::Activate).unwrap(),
            CampaignState::Active
        );
    }

    #[test]
    fn completed_cannot_reactivate() {
        let done = CampaignState::Active.apply(CampaignEvent::Complete).unwrap();
        assert!(done.is_terminal());
        assert!(done.apply(CampaignEvent::Activate).is_err());
        assert!(done.apply(CampaignEvent::Pause).is_err());
    }
}
