//! Snapshot capture workflow
//!
//! Sequential single-pass workflow: check the account image limit, obtain
//! user confirmation when the limit is hit, delete the oldest image, then
//! capture. No step is retried; any failure aborts the remaining steps.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, info};

use crate::errors::DeckError;
use crate::gateway::DeploymentGateway;
use crate::models::deployment::{DeploymentRequest, SnapshotLimitCheck};

/// Host-UI capability for asking the user to free capacity.
///
/// Presented with the oldest-image details; anything other than an explicit
/// yes (including a dismissed prompt) is a decline.
#[async_trait]
pub trait ConfirmationPrompt: Send + Sync {
    async fn confirm(&self, details: &SnapshotLimitCheck) -> bool;
}

/// How a snapshot workflow run ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SnapshotOutcome {
    /// A new image was captured
    Captured,

    /// The limit was hit and the user declined to free capacity. A clean
    /// abort; nothing was deleted or captured.
    Declined,
}

/// Snapshot workflow coordinator
pub struct SnapshotCoordinator<G, C> {
    gateway: Arc<G>,
    prompt: Arc<C>,
}

impl<G, C> SnapshotCoordinator<G, C>
where
    G: DeploymentGateway,
    C: ConfirmationPrompt,
{
    pub fn new(gateway: Arc<G>, prompt: Arc<C>) -> Self {
        Self { gateway, prompt }
    }

    /// Run the capture workflow for one instance.
    ///
    /// `delete_image` is called at most once per run, and only ever
    /// immediately before `capture_image`.
    pub async fn capture(
        &self,
        mut request: DeploymentRequest,
    ) -> Result<SnapshotOutcome, DeckError> {
        let instance_id = request.instance_id.clone().ok_or_else(|| {
            DeckError::ValidationError("capture request is missing an instance id".to_string())
        })?;

        // Empty userData entries break the backend decoder; strip them
        // before submission.
        request.user_data.retain(|entry| !entry.is_empty());

        let limit = self.gateway.check_image_limit(&instance_id).await?;

        if limit.limit_hit {
            debug!(
                "Image limit hit for {}, oldest image: {:?}",
                instance_id, limit.oldest_image_id
            );

            if !self.prompt.confirm(&limit).await {
                info!("Snapshot capture declined for {}", instance_id);
                return Ok(SnapshotOutcome::Declined);
            }

            let image_id = limit.oldest_image_id.as_deref().ok_or_else(|| {
                DeckError::GatewayError(
                    "image limit hit but no oldest image id returned".to_string(),
                )
            })?;
            self.gateway.delete_image(&instance_id, image_id).await?;
        }

        self.gateway.capture_image(&request).await?;

        info!("Snapshot captured for instance {}", instance_id);
        Ok(SnapshotOutcome::Captured)
    }
}
