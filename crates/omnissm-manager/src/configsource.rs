//! Configuration-history service clients.
//!
//! The reconciler needs one client per `(account, region)` partition,
//! possibly under an assumed role, so construction goes through a
//! factory trait rather than a single shared client.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

use crate::errors::{ManagerError, Result};
use crate::event::{ConfigurationItem, INSTANCE_RESOURCE_TYPE};

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// Batched lookup of authoritative configuration state.
#[async_trait]
pub trait ConfigSource: Send + Sync {
    /// Fetch the latest configuration item for each resource id. The
    /// result may omit ids the service does not know about.
    async fn batch_get_resource_config(
        &self,
        resource_ids: &[String],
    ) -> Result<Vec<ConfigurationItem>>;
}

/// Builds a [`ConfigSource`] scoped to an account and region.
pub trait ConfigSourceFactory: Send + Sync {
    /// `assume_role` is the role ARN to assume, or `None` to use the
    /// ambient identity.
    fn client(
        &self,
        account_id: &str,
        region: &str,
        assume_role: Option<&str>,
    ) -> Arc<dyn ConfigSource>;
}

/// JSON-over-HTTP configuration-service client.
pub struct HttpConfigSource {
    client: reqwest::Client,
    base_url: String,
    region: String,
    assume_role: Option<String>,
}

#[derive(Serialize)]
#[serde(rename_all = "PascalCase")]
struct BatchGetRequest<'a> {
    resource_type: &'a str,
    resource_ids: &'a [String],
    region: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    assume_role: Option<&'a str>,
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct BatchGetResponse {
    #[serde(default)]
    configuration_items: Vec<ConfigurationItem>,
}

#[async_trait]
impl ConfigSource for HttpConfigSource {
    async fn batch_get_resource_config(
        &self,
        resource_ids: &[String],
    ) -> Result<Vec<ConfigurationItem>> {
        debug!(count = resource_ids.len(), region = %self.region, "batch get resource config");
        let request = BatchGetRequest {
            resource_type: INSTANCE_RESOURCE_TYPE,
            resource_ids,
            region: &self.region,
            assume_role: self.assume_role.as_deref(),
        };
        let response = self
            .client
            .post(format!("{}/batch-get-resource-config", self.base_url))
            .json(&request)
            .send()
            .await
            .map_err(|e| ManagerError::ConfigurationFetch(e.to_string()))?;
        if !response.status().is_success() {
            return Err(ManagerError::ConfigurationFetch(format!(
                "status {}",
                response.status()
            )));
        }
        let body: BatchGetResponse = response
            .json()
            .await
            .map_err(|e| ManagerError::ConfigurationFetch(e.to_string()))?;
        Ok(body.configuration_items)
    }
}

/// Factory for [`HttpConfigSource`] clients sharing one endpoint.
pub struct HttpConfigSourceFactory {
    client: reqwest::Client,
    base_url: String,
}

impl HttpConfigSourceFactory {
    pub fn new(base_url: &str) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(DEFAULT_TIMEOUT)
            .build()
            .map_err(|e| ManagerError::ConfigurationFetch(e.to_string()))?;
        Ok(HttpConfigSourceFactory {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }
}

impl ConfigSourceFactory for HttpConfigSourceFactory {
    fn client(
        &self,
        _account_id: &str,
        region: &str,
        assume_role: Option<&str>,
    ) -> Arc<dyn ConfigSource> {
        Arc::new(HttpConfigSource {
            client: self.client.clone(),
            base_url: self.base_url.clone(),
            region: region.to_string(),
            assume_role: assume_role.map(str::to_string),
        })
    }
}
