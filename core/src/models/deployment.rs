//! Deployment models

use serde::{Deserialize, Serialize};

/// Instance lifecycle status as reported by the backend
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum InstanceStatus {
    Pending,
    Running,
    Stopping,
    ShuttingDown,
    Stopped,
    Terminated,

    /// Sentinel status the backend reports when the instance is wedged
    Error,
}

/// A deployment row as returned by the backend
///
/// The core holds read-only snapshots of these; the record set is owned
/// by the backend and replaced wholesale on every fetch.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeploymentRecord {
    /// Deployment request ID
    pub deployment_id: String,

    /// Cloud instance ID
    pub instance_id: String,

    pub hostname: String,

    /// Most recent snapshot image ID, empty if none
    #[serde(default)]
    pub snapshot_id: String,

    pub ami: String,

    pub server_size: String,

    pub availability_zone: String,

    /// Lifecycle mode: 'on-demand' or 'spot'
    pub lifecycle: String,

    pub status: InstanceStatus,

    /// Expiry as epoch seconds, "0" or empty when no TTL is set
    #[serde(default)]
    pub time_to_expire: String,

    #[serde(default)]
    pub user_data: Vec<String>,
}

/// Result of the account-level image count check
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SnapshotLimitCheck {
    /// True when capturing another image would exceed the account limit
    pub limit_hit: bool,

    /// Oldest existing image, present when the limit is hit
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub oldest_image_id: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub oldest_image_name: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub oldest_image_date: Option<String>,
}

/// Payload submitted to the backend for capture/create/edit requests
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeploymentRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub instance_id: Option<String>,

    pub hostname: String,

    pub region: String,

    pub ami: String,

    pub server_size: String,

    pub lifecycle: String,

    /// Expiry as epoch seconds, if already scheduled
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<i64>,

    #[serde(default)]
    pub user_data: Vec<String>,

    /// TTL converted to a whole hour count at submit time
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ttl_value: Option<u64>,

    /// Always "h" once a TTL has been applied
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ttl_unit: Option<String>,
}

impl DeploymentRequest {
    /// Attach a TTL to the request, converting it to hours
    pub fn apply_ttl(&mut self, spec: &crate::models::ttl::TtlSpec) {
        self.ttl_value = Some(crate::timeutil::to_hours(spec.value, spec.unit));
        self.ttl_unit = Some("h".to_string());
    }
}
