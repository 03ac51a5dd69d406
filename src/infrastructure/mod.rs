//! Infrastructure layer: persistence, configuration, logging, caching, and
//! the object-store adapter.

pub mod cache;
pub mod config;
pub mod database;
pub mod logging;
pub mod object_store;
