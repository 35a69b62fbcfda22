//! Object-store indirection for oversized event payloads.

use async_trait::async_trait;
use std::time::Duration;
use tracing::debug;

use crate::errors::{ManagerError, Result};

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// Fetch the object at a `bucket/key` location.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    async fn get_object(&self, location: &str) -> Result<Vec<u8>>;
}

/// HTTP object-store client. Locations are `bucket/key` paths, with an
/// optional `s3://` scheme prefix.
pub struct HttpObjectStore {
    client: reqwest::Client,
    base_url: String,
}

impl HttpObjectStore {
    pub fn new(base_url: &str) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(DEFAULT_TIMEOUT)
            .build()
            .map_err(|e| ManagerError::ObjectStore(e.to_string()))?;
        Ok(HttpObjectStore {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }
}

#[async_trait]
impl ObjectStore for HttpObjectStore {
    async fn get_object(&self, location: &str) -> Result<Vec<u8>> {
        let path = location.strip_prefix("s3://").unwrap_or(location);
        debug!(path, "fetching object");
        let response = self
            .client
            .get(format!("{}/{}", self.base_url, path))
            .send()
            .await
            .map_err(|e| ManagerError::ObjectStore(e.to_string()))?;
        if !response.status().is_success() {
            return Err(ManagerError::ObjectStore(format!(
                "status {} for {path}",
                response.status()
            )));
        }
        let bytes = response
            .bytes()
            .await
            .map_err(|e| ManagerError::ObjectStore(e.to_string()))?;
        Ok(bytes.to_vec())
    }
}
