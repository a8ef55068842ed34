//! Backend gateway
//!
//! The only way the core reaches the network. The trait is the seam the
//! poller and snapshot coordinator are tested against.

pub mod http;

use async_trait::async_trait;

use crate::errors::DeckError;
use crate::models::deployment::{DeploymentRecord, DeploymentRequest, SnapshotLimitCheck};

/// Operations the core consumes from the deployment backend
#[async_trait]
pub trait DeploymentGateway: Send + Sync {
    /// Full-table fetch, used for the initial load and each poll tick.
    ///
    /// `force_loading` mirrors the dashboard contract: the initial load
    /// raises the table loading indicator, poll ticks do not.
    async fn list_deployments(
        &self,
        force_loading: bool,
    ) -> Result<Vec<DeploymentRecord>, DeckError>;

    /// Single-record fetch for edit-form prefill
    async fn get_deployment(&self, id: &str) -> Result<DeploymentRecord, DeckError>;

    /// Fire-and-forget start command
    async fn start_instance(&self, instance_id: &str) -> Result<(), DeckError>;

    /// Fire-and-forget stop command
    async fn stop_instance(&self, instance_id: &str) -> Result<(), DeckError>;

    /// Check the account-level image count limit
    async fn check_image_limit(
        &self,
        instance_id: &str,
    ) -> Result<SnapshotLimitCheck, DeckError>;

    /// Deregister an existing image
    async fn delete_image(&self, instance_id: &str, image_id: &str) -> Result<(), DeckError>;

    /// Capture a point-in-time image of an instance
    async fn capture_image(&self, request: &DeploymentRequest) -> Result<(), DeckError>;
}
