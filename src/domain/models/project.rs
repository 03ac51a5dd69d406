//! Project and user models.
//!
//! A project is the tenant boundary: campaigns belong to exactly one
//! project, and agents only receive work from projects they are enrolled in.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Project {
    pub id: i64,
    pub name: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A principal. Only project membership matters to the control plane.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub id: i64,
    pub name: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Kind of file resource an attack references.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceKind {
    WordList,
    RuleList,
    MaskList,
}

impl ResourceKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::WordList => "word_list",
            Self::RuleList => "rule_list",
            Self::MaskList => "mask_list",
        }
    }

    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "word_list" => Some(Self::WordList),
            "rule_list" => Some(Self::RuleList),
            "mask_list" => Some(Self::MaskList),
            _ => None,
        }
    }
}

/// A file resource referenced by attacks. The control plane only knows its
/// identity, store key, and checksum; agents download via presigned URL.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Resource {
    pub id: i64,
    /// None means shared across projects
    pub project_id: Option<i64>,
    pub name: String,
    pub kind: ResourceKind,
    pub store_key: String,
    pub checksum: String,
    pub line_count: Option<i64>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
