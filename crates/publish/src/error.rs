//! Publish error types.

use std::path::PathBuf;

use umcdeploy_content_store::StoreError;

/// Fatal errors that abort a publish.
#[derive(Debug, thiserror::Error)]
pub enum PublishError {
    /// The build directory is missing or unusable. No network call was made.
    #[error("build directory {} is not usable: {reason}", path.display())]
    Precondition { path: PathBuf, reason: String },

    /// The store connection could not be established.
    #[error("content store unavailable: {0}")]
    Initialization(#[source] StoreError),

    /// Ingesting the build failed; nothing was published.
    #[error("publishing {} failed: {source}", path.display())]
    Ingest {
        path: PathBuf,
        #[source]
        source: StoreError,
    },
}

/// Errors produced while acquiring a build directory.
#[derive(Debug, thiserror::Error)]
pub enum BuildError {
    #[error("build directory {} not found; run the build first", path.display())]
    Missing { path: PathBuf },

    #[error("build command `{command}` exited with {status}")]
    Failed { command: String, status: String },

    #[error("could not start build command `{command}`: {source}")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },

    #[error("build command is empty")]
    InvalidCommand,
}

/// A deployment record could not be written.
#[derive(Debug, thiserror::Error)]
#[error("cannot write deployment record {}: {source}", path.display())]
pub struct PersistenceError {
    pub path: PathBuf,
    #[source]
    pub source: std::io::Error,
}
