//! Content store client.
//!
//! `ContentStoreClient` is an explicit context object: construct it once
//! at startup and pass it by reference. The store handle behind it is
//! created lazily on first use and shared by every later call.

use std::path::Path;

use tokio::sync::OnceCell;
use tracing::{debug, info, warn};

use crate::backend::{HealthStatus, Listing, StoreBackend, StoreConnector};
use crate::config::StoreConfig;
use crate::content_id::ContentId;
use crate::error::StoreError;
use crate::pinning::PinningService;

/// Label given to remote pins.
const PIN_LABEL: &str = "umc-landing";

/// An initialized connection: the backend plus remote pinning services.
pub struct StoreHandle {
    backend: Box<dyn StoreBackend>,
    pinners: Vec<PinningService>,
}

impl StoreHandle {
    pub fn backend(&self) -> &dyn StoreBackend {
        self.backend.as_ref()
    }

    /// Names of the remote pinning services that will be used.
    pub fn pinning_services(&self) -> Vec<&str> {
        self.pinners.iter().map(|p| p.name()).collect()
    }
}

/// Request/response access to the content-addressed store.
pub struct ContentStoreClient {
    config: StoreConfig,
    connector: Box<dyn StoreConnector>,
    handle: OnceCell<StoreHandle>,
}

impl ContentStoreClient {
    /// Creates a client. Nothing is contacted until the first operation.
    pub fn new(config: StoreConfig, connector: Box<dyn StoreConnector>) -> Self {
        Self {
            config,
            connector,
            handle: OnceCell::new(),
        }
    }

    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    /// Returns the store handle, creating it on first call.
    ///
    /// Concurrent first callers wait on the same initialization; a failed
    /// attempt leaves the client uninitialized so a later call retries.
    pub async fn ensure_initialized(&self) -> Result<&StoreHandle, StoreError> {
        self.handle
            .get_or_try_init(|| async {
                self.config.validate()?;

                let mut pinners = Vec::new();
                for service in &self.config.pinning {
                    match PinningService::from_config(service)? {
                        Some(pinner) => pinners.push(pinner),
                        None => warn!(
                            service = %service.name,
                            "no credential for pinning service, skipping it"
                        ),
                    }
                }

                let backend = self.connector.connect(&self.config).await.map_err(|e| {
                    match e {
                        StoreError::Initialization { .. } => e,
                        other => StoreError::init(other.to_string()),
                    }
                })?;

                info!(pinning_services = pinners.len(), "content store initialized");
                Ok::<_, StoreError>(StoreHandle { backend, pinners })
            })
            .await
    }

    /// Ingests the directory at `path` and returns its root identifier.
    ///
    /// The content is reachable afterwards but not durable until pinned.
    pub async fn ingest_directory(&self, path: &Path) -> Result<ContentId, StoreError> {
        if !path.is_dir() {
            return Err(StoreError::not_found(path.display().to_string()));
        }
        let handle = self.ensure_initialized().await?;
        let cid = handle.backend.add_directory(path).await?;
        info!(cid = %cid, path = %path.display(), "directory ingested");
        Ok(cid)
    }

    /// Pins `cid` on the node, then on every remote pinning service.
    ///
    /// All targets are attempted; the error lists each one that failed.
    pub async fn pin(&self, cid: &ContentId) -> Result<(), StoreError> {
        let handle = self.ensure_initialized().await?;
        let mut failures = Vec::new();

        match handle.backend.pin(cid).await {
            Ok(()) => debug!(cid = %cid, "pinned on node"),
            Err(e) => failures.push(format!("node: {e}")),
        }

        for pinner in &handle.pinners {
            match pinner.pin(cid, PIN_LABEL).await {
                Ok(()) => debug!(cid = %cid, service = %pinner.name(), "pinned remotely"),
                Err(e) => failures.push(format!("{}: {e}", pinner.name())),
            }
        }

        if failures.is_empty() {
            info!(cid = %cid, "content pinned");
            Ok(())
        } else {
            Err(StoreError::Pin {
                cid: cid.to_string(),
                failures,
            })
        }
    }

    /// Reads the bytes at `relative_path` inside the tree `cid`.
    pub async fn retrieve(
        &self,
        cid: &ContentId,
        relative_path: &str,
    ) -> Result<Vec<u8>, StoreError> {
        let handle = self.ensure_initialized().await?;
        handle.backend.cat(cid, relative_path).await
    }

    /// Lists one level of the directory `cid`.
    ///
    /// Each call issues a fresh request.
    pub async fn list_children(&self, cid: &ContentId) -> Result<Listing, StoreError> {
        let handle = self.ensure_initialized().await?;
        let entries = handle.backend.ls(cid).await?;
        Ok(Listing::new(entries))
    }

    /// Reports connectivity.
    ///
    /// Fails only when the handle itself cannot be obtained.
    pub async fn health_check(&self) -> Result<HealthStatus, StoreError> {
        let handle = self.ensure_initialized().await?;
        let status = handle.backend.health().await;
        info!(
            node = %status.node_id,
            online = status.online,
            connections = status.connections,
            protocols = status.protocols.len(),
            "store health"
        );
        Ok(status)
    }

    /// Makes `cid` discoverable through the configured routing.
    pub async fn announce(&self, cid: &ContentId) -> Result<(), StoreError> {
        let handle = self.ensure_initialized().await?;
        handle.backend.announce(cid).await
    }
}
