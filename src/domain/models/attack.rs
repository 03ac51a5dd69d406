//! Attack domain model.
//!
//! An attack is one cracking strategy within a campaign. The mode
//! discriminates which resource references must be present.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::errors::CoreError;

/// Hashcat attack mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttackMode {
    Dictionary,
    Mask,
    BruteForce,
    HybridDict,
    HybridMask,
}

impl AttackMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Dictionary => "dictionary",
            Self::Mask => "mask",
            Self::BruteForce => "brute_force",
            Self::HybridDict => "hybrid_dict",
            Self::HybridMask => "hybrid_mask",
        }
    }

    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "dictionary" => Some(Self::Dictionary),
            "mask" => Some(Self::Mask),
            "brute_force" => Some(Self::BruteForce),
            "hybrid_dict" => Some(Self::HybridDict),
            "hybrid_mask" => Some(Self::HybridMask),
            _ => None,
        }
    }

    /// Numeric hashcat `-a` value for the wire contract.
    pub fn hashcat_mode(&self) -> u8 {
        match self {
            Self::Dictionary => 0,
            Self::Mask | Self::BruteForce => 3,
            Self::HybridDict => 6,
            Self::HybridMask => 7,
        }
    }
}

/// State of an attack.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttackState {
    Pending,
    Running,
    Completed,
    Exhausted,
    Failed,
    Paused,
}

impl Default for AttackState {
    fn default() -> Self {
        Self::Pending
    }
}

/// Named events that drive attack transitions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttackEvent {
    /// A task on this attack was accepted by an agent
    Accept,
    Complete,
    Exhaust,
    Fail,
    Pause,
    Resume,
    /// The attack lost its running tasks and returns to the queue
    Reset,
}

impl AttackEvent {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Accept => "accept",
            Self::Complete => "complete",
            Self::Exhaust => "exhaust",
            Self::Fail => "fail",
            Self::Pause => "pause",
            Self::Resume => "resume",
            Self::Reset => "reset",
        }
    }
}

impl AttackState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Exhausted => "exhausted",
            Self::Failed => "failed",
            Self::Paused => "paused",
        }
    }

    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "pending" => Some(Self::Pending),
            "running" => Some(Self::Running),
            "completed" | "complete" => Some(Self::Completed),
            "exhausted" => Some(Self::Exhausted),
            "failed" => Some(Self::Failed),
            "paused" => Some(Self::Paused),
            _ => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Exhausted | Self::Failed)
    }

    /// Pending, running, or paused: the attack may still produce work.
    pub fn is_incomplete(&self) -> bool {
        !self.is_terminal()
    }

    /// Apply a named event. `Accept` is idempotent on a running attack.
    pub fn apply(&self, event: AttackEvent) -> Result<AttackState, CoreError> {
        use AttackEvent as E;
        use AttackState as S;

        let next = match (self, event) {
            (S::Pending | S::Running, E::Accept) => S::Running,
            (S::Running | S::Completed, E::Complete) => S::Completed,
            (S::Running | S::Exhausted, E::Exhaust) => S::Exhausted,
            (S::Running | S::Pending | S::Failed, E::Fail) => S::Failed,
            (S::Pending | S::Running | S::Paused, E::Pause) => S::Paused,
            (S::Paused, E::Resume) => S::Running,
            (S::Running | S::Pending, E::Reset) => S::Pending,
            (from, event) => {
                return Err(CoreError::InvalidTransition {
                    entity: "attack",
                    from: from.as_str(),
                    event: event.as_str(),
                })
            }
        };
        Ok(next)
    }
}

/// A cracking strategy within a campaign.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Attack {
    pub id: i64,
    pub campaign_id: i64,
    pub name: String,
    pub attack_mode: AttackMode,
    /// Numeric hashcat algorithm identifier, denormalized from the hash list
    pub hash_mode: u32,
    pub state: AttackState,
    pub mask: Option<String>,
    pub increment_mode: bool,
    pub increment_minimum: Option<u32>,
    pub increment_maximum: Option<u32>,
    pub optimized: bool,
    pub slow_candidate_generators: bool,
    pub workload_profile: u8,
    pub disable_markov: bool,
    pub classic_markov: bool,
    pub markov_threshold: Option<u32>,
    pub word_list_id: Option<i64>,
    pub rule_list_id: Option<i64>,
    pub mask_list_id: Option<i64>,
    pub custom_charset_1: Option<String>,
    pub custom_charset_2: Option<String>,
    pub custom_charset_3: Option<String>,
    pub custom_charset_4: Option<String>,
    pub left_rule: Option<String>,
    pub right_rule: Option<String>,
    /// Estimated keyspace; never negative
    pub complexity_value: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Attack {
    /// Per-mode validation of resource references and mask settings.
    pub fn validate(&self) -> Result<(), CoreError> {
        if self.complexity_value < 0 {
            return Err(CoreError::Validation(
                "complexity_value must be non-negative".into(),
            ));
        }
        match self.attack_mode {
            AttackMode::Dictionary => {
                if self.word_list_id.is_none() {
                    return Err(CoreError::Validation(
                        "dictionary attack requires a word list".into(),
                    ));
                }
            }
            AttackMode::Mask => {
                if self.mask.is_none() && self.mask_list_id.is_none() {
                    return Err(CoreError::Validation(
                        "mask attack requires a mask or a mask list".into(),
                    ));
                }
            }
            AttackMode::BruteForce => {
                if self.mask.is_none() {
                    return Err(CoreError::Validation(
                        "brute force attack requires a generated mask".into(),
                    ));
                }
            }
            AttackMode::HybridDict => {
                if self.word_list_id.is_none() || self.mask.is_none() {
                    return Err(CoreError::Validation(
                        "hybrid attack requires a word list and a mask".into(),
                    ));
                }
            }
            AttackMode::HybridMask => {
                if self.mask.is_none() || self.word_list_id.is_none() {
                    return Err(CoreError::Validation(
                        "hybrid attack requires a mask and a word list".into(),
                    ));
                }
            }
        }
        Ok(())
    }
}
