//! Data types for the publish flow.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use umcdeploy_content_store::{ContentId, HealthStatus};

use crate::gateway::GatewayConfig;

/// Publish policy passed to the orchestrator.
#[derive(Debug, Clone)]
pub struct PublishSettings {
    pub gateways: GatewayConfig,
    /// Pin new content after ingest.
    pub auto_pin: bool,
    /// Version string written to the deployment record.
    pub version: String,
}

/// A non-fatal problem encountered while publishing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PublishWarning {
    /// The store reported itself unhealthy before ingest.
    Unhealthy(HealthStatus),
    /// Announcing the identifier to peers failed.
    Announce(String),
    /// Pinning failed; the content is published but not guaranteed durable.
    Pin(String),
    /// The deployment record could not be written.
    Record(String),
}

impl std::fmt::Display for PublishWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Unhealthy(status) => write!(
                f,
                "store node is offline ({} connections); published content may be slow to propagate",
                status.connections
            ),
            Self::Announce(e) => write!(f, "content announcement failed: {e}"),
            Self::Pin(e) => write!(f, "content is published but not guaranteed durable: {e}"),
            Self::Record(e) => write!(f, "deployment record not saved: {e}"),
        }
    }
}

/// Outcome of a successful publish.
#[derive(Debug, Clone)]
pub struct PublishResult {
    pub cid: ContentId,
    /// One access URL per configured gateway, in gateway order.
    pub urls: Vec<String>,
    /// Canonical `ipfs://<cid>` URL.
    pub ipfs_url: String,
    /// `true` only when pinning was requested and succeeded everywhere.
    pub pinned: bool,
    pub warnings: Vec<PublishWarning>,
}

impl PublishResult {
    /// Returns `true` when the publish finished without any warning.
    pub fn is_clean(&self) -> bool {
        self.warnings.is_empty()
    }
}

/// Persisted record of one successful publish.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeploymentRecord {
    pub timestamp: DateTime<Utc>,
    pub cid: ContentId,
    pub urls: Vec<String>,
    pub ipfs_url: String,
    pub version: String,
}

impl DeploymentRecord {
    /// Builds the record for `result`, stamped with the current time.
    pub fn from_result(result: &PublishResult, version: &str) -> Self {
        Self {
            timestamp: Utc::now(),
            cid: result.cid,
            urls: result.urls.clone(),
            ipfs_url: result.ipfs_url.clone(),
            version: version.to_string(),
        }
    }
}
