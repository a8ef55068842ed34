//! HTTP gateway implementation

use async_trait::async_trait;
use reqwest::Client;
use serde::{de::DeserializeOwned, Serialize};
use tracing::{debug, error};

use crate::errors::DeckError;
use crate::gateway::DeploymentGateway;
use crate::models::deployment::{DeploymentRecord, DeploymentRequest, SnapshotLimitCheck};

/// HTTP gateway against the deployment backend
pub struct HttpGateway {
    client: Client,
    base_url: String,
}

impl HttpGateway {
    /// Create a new HTTP gateway
    pub fn new(base_url: &str) -> Result<Self, DeckError> {
        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(30))
            .build()?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    /// Get the base URL
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Make a GET request
    async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T, DeckError> {
        let url = format!("{}{}", self.base_url, path);
        debug!("GET {}", url);

        let response = self.client.get(&url).send().await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            error!("HTTP GET failed: {} - {}", status, body);
            return Err(DeckError::GatewayError(format!("{}: {}", status, body)));
        }

        let body = response.json().await?;
        Ok(body)
    }

    /// Make a POST request with no body, discarding the response
    async fn post_command(&self, path: &str) -> Result<(), DeckError> {
        let url = format!("{}{}", self.base_url, path);
        debug!("POST {}", url);

        let response = self.client.post(&url).send().await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            error!("HTTP POST failed: {} - {}", status, body);
            return Err(DeckError::GatewayError(format!("{}: {}", status, body)));
        }

        Ok(())
    }

    /// Make a PUT request with a JSON body, discarding the response
    async fn put<B: Serialize>(&self, path: &str, body: &B) -> Result<(), DeckError> {
        let url = format!("{}{}", self.base_url, path);
        debug!("PUT {}", url);

        let response = self.client.put(&url).json(body).send().await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            error!("HTTP PUT failed: {} - {}", status, body);
            return Err(DeckError::GatewayError(format!("{}: {}", status, body)));
        }

        Ok(())
    }

    /// Make a DELETE request, discarding the response
    async fn delete(&self, path: &str) -> Result<(), DeckError> {
        let url = format!("{}{}", self.base_url, path);
        debug!("DELETE {}", url);

        let response = self.client.delete(&url).send().await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            error!("HTTP DELETE failed: {} - {}", status, body);
            return Err(DeckError::GatewayError(format!("{}: {}", status, body)));
        }

        Ok(())
    }
}

#[async_trait]
impl DeploymentGateway for HttpGateway {
    async fn list_deployments(
        &self,
        force_loading: bool,
    ) -> Result<Vec<DeploymentRecord>, DeckError> {
        if force_loading {
            debug!("Fetching deployments (table reload)");
        }
        self.get("/deployments").await
    }

    async fn get_deployment(&self, id: &str) -> Result<DeploymentRecord, DeckError> {
        self.get(&format!("/instance-request/{}", id)).await
    }

    async fn start_instance(&self, instance_id: &str) -> Result<(), DeckError> {
        self.post_command(&format!("/start-instance/{}", instance_id))
            .await
    }

    async fn stop_instance(&self, instance_id: &str) -> Result<(), DeckError> {
        self.post_command(&format!("/stop-instance/{}", instance_id))
            .await
    }

    async fn check_image_limit(
        &self,
        instance_id: &str,
    ) -> Result<SnapshotLimitCheck, DeckError> {
        self.get(&format!("/snapshot-limit/{}", instance_id)).await
    }

    async fn delete_image(&self, instance_id: &str, image_id: &str) -> Result<(), DeckError> {
        self.delete(&format!("/snapshot/{}/{}", instance_id, image_id))
            .await
    }

    async fn capture_image(&self, request: &DeploymentRequest) -> Result<(), DeckError> {
        let id = request.id.as_deref().ok_or_else(|| {
            DeckError::ValidationError("capture request is missing a deployment id".to_string())
        })?;
        self.put(&format!("/capture-instance-snapshot/{}", id), request)
            .await
    }
}
