//! Store error types.

use std::path::PathBuf;

/// Errors produced by the content store client and its backends.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// The store connection could not be stood up.
    #[error("store initialization failed: {reason}")]
    Initialization { reason: String },

    /// A local path, or a path inside a stored tree, does not resolve.
    #[error("not found: {target}")]
    NotFound { target: String },

    /// Ingesting a directory failed.
    #[error("ingest of {} failed: {reason}", path.display())]
    Ingest { path: PathBuf, reason: String },

    /// One or more pin requests were rejected.
    #[error("pinning {cid} failed: {}", failures.join("; "))]
    Pin { cid: String, failures: Vec<String> },

    /// Neither announcement route accepted the identifier.
    #[error("announcing {cid} failed: {}", failures.join("; "))]
    Announce { cid: String, failures: Vec<String> },

    #[error("invalid CID {input:?}: {reason}")]
    InvalidCid { input: String, reason: String },

    #[error("store API error {status}: {message}")]
    Api { status: u16, message: String },

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl StoreError {
    pub(crate) fn not_found(target: impl Into<String>) -> Self {
        Self::NotFound {
            target: target.into(),
        }
    }

    pub(crate) fn init(reason: impl Into<String>) -> Self {
        Self::Initialization {
            reason: reason.into(),
        }
    }

    /// Returns `true` for [`StoreError::NotFound`].
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}
