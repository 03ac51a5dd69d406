//! Severity-tagged agent error events.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Error severity as reported by agents.
///
/// The legacy wire value `low` is accepted as an alias for `info`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    #[serde(alias = "low")]
    Info,
    Warning,
    Minor,
    Major,
    Critical,
    Fatal,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Info => "info",
            Self::Warning => "warning",
            Self::Minor => "minor",
            Self::Major => "major",
            Self::Critical => "critical",
            Self::Fatal => "fatal",
        }
    }

    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "info" | "low" => Some(Self::Info),
            "warning" => Some(Self::Warning),
            "minor" => Some(Self::Minor),
            "major" => Some(Self::Major),
            "critical" => Some(Self::Critical),
            "fatal" => Some(Self::Fatal),
            _ => None,
        }
    }

    /// Fatal errors disqualify the associated task from retry.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Fatal)
    }
}

/// A severity-tagged event recorded against an agent, optionally tied to a
/// task.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentError {
    pub id: i64,
    pub agent_id: i64,
    pub task_id: Option<i64>,
    pub severity: Severity,
    pub message: String,
    pub metadata: Option<serde_json::Value>,
    pub created_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn low_aliases_to_info() {
        assert_eq!(Severity::from_str("low"), Some(Severity::Info));
        let parsed: Severity = serde_json::from_str("\"low\"").unwrap();
        assert_eq!(parsed, Severity::Info);
    }

    #[test]
    fn severity_ordering() {
        assert!(Severity::Fatal > Severity::Critical);
        assert!(Severity::Critical > Severity::Info);
    }

    #[test]
    fn only_fatal_is_fatal() {
        assert!(Severity::Fatal.is_fatal());
        assert!(!Severity::Critical.is_fatal());
        assert!(!Severity::Info.is_fatal());
    }
}
