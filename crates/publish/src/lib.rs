//! Publish flow: build acquisition, ingest, pin, gateway URLs, history.
//!
//! This crate implements the **business logic** for publishing the
//! landing page's static build to a content-addressed store. It is a
//! library crate with no terminal dependencies; the CLI wires it to a
//! [`ContentStoreClient`](umcdeploy_content_store::ContentStoreClient)
//! and a [`DeploymentRecorder`].
//!
//! # Pipeline
//!
//! 1. **Build** — pick the directory to publish (reuse, rebuild or skip)
//! 2. **Check** — the directory must exist and be non-empty
//! 3. **Health** — advisory store health check
//! 4. **Ingest** — add the tree to the store (fatal on failure)
//! 5. **URLs** — one access URL per gateway plus `ipfs://<cid>`
//! 6. **Announce / Pin** — best effort, failures become warnings
//! 7. **Record** — persist the deployment record (best effort)

pub mod build;
pub mod error;
pub mod gateway;
pub mod orchestrator;
pub mod project;
pub mod recorder;
pub mod types;

// Re-export primary types for convenience.
pub use build::{BuildProducer, BuildStrategy, CommandBuild, acquire_build};
pub use error::{BuildError, PersistenceError, PublishError};
pub use gateway::{DEFAULT_GATEWAYS, GatewayConfig, canonical_url};
pub use orchestrator::{PublishEvent, PublishOrchestrator, PublishStage};
pub use project::package_version;
pub use recorder::{DeploymentRecorder, JsonFileRecorder, load_latest};
pub use types::{DeploymentRecord, PublishResult, PublishSettings, PublishWarning};
