//! Content-addressed store client.
//!
//! This crate owns the connection to the content-addressed network and
//! exposes ingest, pin, retrieve, list and health operations as plain
//! request/response calls. It has no CLI or terminal dependencies; the
//! publish crate drives it through [`ContentStoreClient`].
//!
//! # Backends
//!
//! - **Kubo** — an IPFS node reached over its HTTP RPC API
//! - **Memory** — an in-process store with deterministic identifiers,
//!   used by tests and embedders
//!
//! Backends are constructed exactly once per client through a
//! [`StoreConnector`]; remote pinning services are layered on top.

pub mod backend;
pub mod client;
pub mod config;
pub mod content_id;
pub mod error;
pub mod kubo;
pub mod memory;
pub mod pinning;
pub mod scanner;

// Re-export primary types for convenience.
pub use backend::{
    BoxFuture, DirEntry, EntryKind, HealthStatus, Listing, StoreBackend, StoreConnector,
};
pub use client::{ContentStoreClient, StoreHandle};
pub use config::{PinServiceConfig, PinServiceKind, RoutingConfig, StoreConfig};
pub use content_id::{ContentId, is_valid_cid};
pub use error::StoreError;
pub use kubo::{KuboBackend, KuboConnector};
pub use memory::{MemoryConnector, MemoryStore};
pub use pinning::PinningService;
pub use scanner::{ScannedEntry, is_non_empty_dir, scan_tree};
