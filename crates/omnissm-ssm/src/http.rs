//! HTTP implementation of the fleet-management API.

use async_trait::async_trait;
use serde::Serialize;
use std::time::Duration;
use tracing::debug;

use crate::errors::{Result, SsmError};
use crate::traits::SsmApi;
use crate::types::{Activation, ActivationRequest, CustomInventory, ResourceTags};

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// JSON-over-HTTP client for the fleet-management endpoint.
pub struct HttpSsmClient {
    client: reqwest::Client,
    base_url: String,
}

impl HttpSsmClient {
    pub fn new(base_url: &str) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(DEFAULT_TIMEOUT)
            .build()
            .map_err(|e| SsmError::BadResponse(e.to_string()))?;
        Ok(HttpSsmClient {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    async fn post<B: Serialize>(&self, path: &str, body: &B) -> Result<reqwest::Response> {
        let url = format!("{}{}", self.base_url, path);
        let response = self
            .client
            .post(&url)
            .json(body)
            .send()
            .await
            .map_err(classify_transport)?;
        classify_status(response).await
    }
}

/// Transport failures (timeouts, connection loss) carry a retryable
/// signal; the request never reached the service.
fn classify_transport(err: reqwest::Error) -> SsmError {
    SsmError::Retryable(err.to_string())
}

async fn classify_status(response: reqwest::Response) -> Result<reqwest::Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let message = response.text().await.unwrap_or_default();
    if status.as_u16() == 429 {
        Err(SsmError::Throttled(message))
    } else if status.is_server_error() {
        Err(SsmError::Retryable(message))
    } else {
        Err(SsmError::Api {
            status: status.as_u16(),
            message,
        })
    }
}

#[async_trait]
impl SsmApi for HttpSsmClient {
    async fn create_activation(&self, request: &ActivationRequest) -> Result<Activation> {
        debug!(name = %request.default_instance_name, "creating activation");
        self.post("/activations", request)
            .await?
            .json()
            .await
            .map_err(|e| SsmError::BadResponse(e.to_string()))
    }

    async fn add_tags_to_resource(&self, tags: &ResourceTags) -> Result<()> {
        debug!(resource = %tags.resource_id, count = tags.tags.len(), "adding tags");
        self.post("/tags", tags).await?;
        Ok(())
    }

    async fn put_inventory(&self, inventory: &CustomInventory) -> Result<()> {
        debug!(managed_id = %inventory.managed_id, "putting inventory");
        self.post("/inventory", inventory).await?;
        Ok(())
    }

    async fn deregister_managed_instance(&self, managed_id: &str) -> Result<()> {
        debug!(managed_id, "deregistering managed instance");
        #[derive(Serialize)]
        #[serde(rename_all = "PascalCase")]
        struct Deregister<'a> {
            managed_id: &'a str,
        }
        self.post("/deregister", &Deregister { managed_id }).await?;
        Ok(())
    }
}
