//! Hash list and hash item domain models.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A unique set of hash items sharing one hash type.
///
/// `uncracked_count` is denormalized and kept in step inside the crack
/// transaction; the maintenance loop recounts it when it drifts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HashList {
    pub id: i64,
    pub project_id: i64,
    pub name: String,
    /// Numeric hashcat mode shared by every item in the list
    pub hash_type_id: u32,
    pub uncracked_count: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// One hash, optionally cracked.
///
/// Invariant: `cracked` implies `plain_text` is set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HashItem {
    pub id: i64,
    pub hash_list_id: i64,
    pub hash_value: String,
    pub plain_text: Option<String>,
    pub cracked: bool,
    pub cracked_time: Option<DateTime<Utc>>,
    /// Which attack cracked it, when cracked
    pub attack_id: Option<i64>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl HashItem {
    /// Truncated prefix for log lines. Plaintext never appears in logs.
    pub fn hash_prefix(&self) -> &str {
        let end = self.hash_value.len().min(8);
        &self.hash_value[..end]
    }

    /// One `hash:plain` line of the cracked list. Items whose plaintext is
    /// withheld render as the bare hash.
    pub fn cracked_line(&self) -> String {
        match &self.plain_text {
            Some(plain) => format!("{}:{}", self.hash_value, plain),
            None => self.hash_value.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(hash: &str, plain: Option<&str>) -> HashItem {
        let now = Utc::now();
        HashItem {
            id: 1,
            hash_list_id: 1,
            hash_value: hash.into(),
            plain_text: plain.map(Into::into),
            cracked: plain.is_some(),
            cracked_time: plain.map(|_| now),
            attack_id: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn hash_prefix_truncates() {
        let i = item("5f4dcc3b5aa765d61d8327deb882cf99", None);
        assert_eq!(i.hash_prefix(), "5f4dcc3b");
        let short = item("abc", None);
        assert_eq!(short.hash_prefix(), "abc");
    }

    #[test]
    fn cracked_line_formats() {
        let i = item("5f4dcc3b5aa765d61d8327deb882cf99", Some("password"));
        assert_eq!(i.cracked_line(), "5f4dcc3b5aa765d61d8327deb882cf99:password");
        let secret = item("5f4dcc3b5aa765d61d8327deb882cf99", None);
        assert_eq!(secret.cracked_line(), "5f4dcc3b5aa765d61d8327deb882cf99");
    }
}
