//! Deployment history.
//!
//! The latest record is overwritten on every publish; an optional
//! history log keeps one JSON line per publish.

use std::path::{Path, PathBuf};

use tokio::io::AsyncWriteExt;
use tracing::debug;
use umcdeploy_content_store::BoxFuture;

use crate::error::PersistenceError;
use crate::types::DeploymentRecord;

/// Destination for deployment records.
pub trait DeploymentRecorder: Send + Sync {
    fn record<'a>(
        &'a self,
        record: &'a DeploymentRecord,
    ) -> BoxFuture<'a, Result<(), PersistenceError>>;
}

/// Writes records as JSON files.
#[derive(Debug, Clone)]
pub struct JsonFileRecorder {
    latest: PathBuf,
    history: Option<PathBuf>,
}

impl JsonFileRecorder {
    /// Records into `latest`, replacing the previous record.
    pub fn new(latest: impl Into<PathBuf>) -> Self {
        Self {
            latest: latest.into(),
            history: None,
        }
    }

    /// Also appends every record to the NDJSON log at `path`.
    pub fn with_history(mut self, path: impl Into<PathBuf>) -> Self {
        self.history = Some(path.into());
        self
    }

    pub fn latest_path(&self) -> &Path {
        &self.latest
    }

    async fn write_latest(&self, record: &DeploymentRecord) -> Result<(), PersistenceError> {
        let err = |source| PersistenceError {
            path: self.latest.clone(),
            source,
        };

        let json = serde_json::to_string_pretty(record)
            .map_err(|e| err(std::io::Error::other(e)))?;

        // Write beside the target, then rename over it.
        let tmp = self.latest.with_extension("json.tmp");
        tokio::fs::write(&tmp, format!("{json}\n"))
            .await
            .map_err(err)?;
        if let Err(e) = tokio::fs::rename(&tmp, &self.latest).await {
            let _ = tokio::fs::remove_file(&tmp).await;
            return Err(err(e));
        }
        Ok(())
    }

    async fn append_history(
        &self,
        path: &Path,
        record: &DeploymentRecord,
    ) -> Result<(), PersistenceError> {
        let err = |source| PersistenceError {
            path: path.to_path_buf(),
            source,
        };

        let line = serde_json::to_string(record).map_err(|e| err(std::io::Error::other(e)))?;
        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .await
            .map_err(err)?;
        file.write_all(format!("{line}\n").as_bytes())
            .await
            .map_err(err)?;
        file.flush().await.map_err(err)?;
        Ok(())
    }
}

impl DeploymentRecorder for JsonFileRecorder {
    fn record<'a>(
        &'a self,
        record: &'a DeploymentRecord,
    ) -> BoxFuture<'a, Result<(), PersistenceError>> {
        Box::pin(async move {
            self.write_latest(record).await?;
            if let Some(history) = &self.history {
                self.append_history(history, record).await?;
            }
            debug!(path = %self.latest.display(), cid = %record.cid, "deployment recorded");
            Ok(())
        })
    }
}

/// Reads the most recent record.
///
/// A missing file yields `Ok(None)`; an unreadable or malformed one is an error.
pub fn load_latest(path: &Path) -> Result<Option<DeploymentRecord>, PersistenceError> {
    let content = match std::fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(source) => {
            return Err(PersistenceError {
                path: path.to_path_buf(),
                source,
            });
        }
    };

    serde_json::from_str(&content)
        .map(Some)
        .map_err(|e| PersistenceError {
            path: path.to_path_buf(),
            source: std::io::Error::new(std::io::ErrorKind::InvalidData, e),
        })
}
