//! Object-store adapter.
//!
//! The control plane never proxies file bytes. Agents receive presigned
//! URLs and download directly; the store fronting those URLs enforces the
//! baked-in expiry.

use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use uuid::Uuid;

use crate::domain::errors::{CoreError, CoreResult};
use crate::domain::models::config::ObjectStoreConfig;
use crate::domain::ports::ObjectStore;

pub struct HttpObjectStore {
    client: reqwest::Client,
    config: ObjectStoreConfig,
}

impl HttpObjectStore {
    pub fn new(config: ObjectStoreConfig) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(5))
            .build()
            .unwrap_or_default();
        Self { client, config }
    }

    pub fn config(&self) -> &ObjectStoreConfig {
        &self.config
    }
}

#[async_trait]
impl ObjectStore for HttpObjectStore {
    fn presigned_url(&self, key: &str) -> String {
        let expires = Utc::now().timestamp() + i64::try_from(self.config.url_ttl_seconds).unwrap_or(3600);
        let token = Uuid::new_v4().simple();
        format!(
            "{}/{}/{}?expires={}&token={}",
            self.config.endpoint.trim_end_matches('/'),
            self.config.bucket,
            key,
            expires,
            token
        )
    }

    async fn health(&self) -> CoreResult<()> {
        let url = format!("{}/", self.config.endpoint.trim_end_matches('/'));
        match self.client.head(&url).send().await {
            Ok(_) => Ok(()),
            Err(e) if e.is_timeout() => Err(CoreError::Timeout("object store".into())),
            Err(e) => Err(CoreError::Dependency(format!("object store: {e}"))),
        }
    }
}
