//! Object store port.
//!
//! The control plane never proxies file bytes; agents download resources and
//! list materializations through presigned URLs.

use async_trait::async_trait;

use crate::domain::errors::CoreResult;

#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// A time-limited download URL for the given store key.
    fn presigned_url(&self, key: &str) -> String;

    /// Reachability probe used by the system-health service.
    async fn health(&self) -> CoreResult<()>;
}
