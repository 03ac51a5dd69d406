//! CipherSwarm control plane.
//!
//! Coordinates a fleet of distributed hashcat agents:
//! - Task assignment with priority ordering and preemption
//! - Crack submission with cross-list propagation
//! - Status ingest and timeout-driven abandonment
//! - Agent lifecycle (heartbeat, benchmarks, errors)
//! - Periodic maintenance over a shared SQLite store
//! - Cached, single-flight system-health probing

pub mod api;
pub mod bootstrap;
pub mod domain;
pub mod infrastructure;
pub mod services;

pub use domain::errors::{CoreError, CoreResult};
pub use infrastructure::database::DatabaseConnection;
