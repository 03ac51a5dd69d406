//! Hashcat status snapshots.
//!
//! A status is a point-in-time sample of a running task: session, timing,
//! progress, the current guess, and per-device telemetry. Retention is
//! bounded per task by the maintenance loop.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// The guess block of a status snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HashcatGuess {
    pub guess_base: Option<String>,
    pub guess_base_count: u64,
    pub guess_base_offset: u64,
    pub guess_base_percentage: f64,
    pub guess_mod: Option<String>,
    pub guess_mod_count: u64,
    pub guess_mod_offset: u64,
    pub guess_mod_percentage: f64,
    pub guess_mode: i32,
}

/// Per-device measurements within a status snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeviceStatus {
    pub device_id: i32,
    pub device_name: String,
    pub device_type: String,
    /// Guesses per second
    pub speed: i64,
    pub utilization: i32,
    pub temperature: i32,
}

/// A stored status snapshot for one task.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HashcatStatus {
    pub id: i64,
    pub task_id: i64,
    pub session: String,
    /// Raw hashcat status code
    pub status: i32,
    pub time_start: DateTime<Utc>,
    pub estimated_stop: Option<DateTime<Utc>>,
    pub progress_done: i64,
    pub progress_total: i64,
    pub restore_point: i64,
    pub rejected: i64,
    pub guess: HashcatGuess,
    pub devices: Vec<DeviceStatus>,
    pub created_at: DateTime<Utc>,
}

impl HashcatStatus {
    /// Progress as a percentage, clamped to 0..=100.
    pub fn progress_percent(&self) -> f64 {
        if self.progress_total <= 0 {
            return 0.0;
        }
        #[allow(clippy::cast_precision_loss)]
        let pct = (self.progress_done as f64 / self.progress_total as f64) * 100.0;
        pct.clamp(0.0, 100.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn status(done: i64, total: i64) -> HashcatStatus {
        HashcatStatus {
            id: 1,
            task_id: 1,
            session: "cs_1".into(),
            status: 3,
            time_start: Utc::now(),
            estimated_stop: None,
            progress_done: done,
            progress_total: total,
            restore_point: 0,
            rejected: 0,
            guess: HashcatGuess {
                guess_base: None,
                guess_base_count: 0,
                guess_base_offset: 0,
                guess_base_percentage: 0.0,
                guess_mod: None,
                guess_mod_count: 0,
                guess_mod_offset: 0,
                guess_mod_percentage: 0.0,
                guess_mode: 0,
            },
            devices: vec![],
            created_at: Utc::now(),
        }
    }

    #[test]
    fn progress_percent_basic() {
        assert!((status(30, 100).progress_percent() - 30.0).abs() < f64::EPSILON);
        assert!((status(100, 100).progress_percent() - 100.0).abs() < f64::EPSILON);
    }

    #[test]
    fn progress_percent_degenerate_totals() {
        assert!(status(5, 0).progress_percent().abs() < f64::EPSILON);
        assert!(status(5, -1).progress_percent().abs() < f64::EPSILON);
        // Overshoot clamps rather than exceeding 100
        assert!((status(150, 100).progress_percent() - 100.0).abs() < f64::EPSILON);
    }
}
