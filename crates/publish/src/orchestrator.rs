//! Publish orchestrator.
//!
//! Sequences check → health → ingest → URLs → announce → pin → record.
//! Only the precondition, store initialization and ingest can fail a
//! publish; everything after ingest degrades to a warning.

use std::path::Path;

use tokio::sync::mpsc;
use tracing::{error, info, warn};
use umcdeploy_content_store::{ContentId, ContentStoreClient, StoreError, is_non_empty_dir};

use crate::error::PublishError;
use crate::gateway::canonical_url;
use crate::recorder::DeploymentRecorder;
use crate::types::{DeploymentRecord, PublishResult, PublishSettings, PublishWarning};

/// Step of the publish pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PublishStage {
    CheckingBuild,
    HealthCheck,
    Ingesting,
    Announcing,
    Pinning,
    Recording,
}

/// Progress event emitted during a publish.
#[derive(Debug, Clone)]
pub enum PublishEvent {
    Stage(PublishStage),
    Warning(PublishWarning),
    Completed { cid: ContentId },
    Failed { error: String },
}

/// Publishes build directories through a content store client.
pub struct PublishOrchestrator<'a> {
    store: &'a ContentStoreClient,
    recorder: &'a dyn DeploymentRecorder,
    settings: PublishSettings,
    events_tx: mpsc::Sender<PublishEvent>,
    events_rx: Option<mpsc::Receiver<PublishEvent>>,
}

impl<'a> PublishOrchestrator<'a> {
    pub fn new(
        store: &'a ContentStoreClient,
        recorder: &'a dyn DeploymentRecorder,
        settings: PublishSettings,
    ) -> Self {
        let (events_tx, events_rx) = mpsc::channel(64);
        Self {
            store,
            recorder,
            settings,
            events_tx,
            events_rx: Some(events_rx),
        }
    }

    /// Takes the event receiver. Can only be called once.
    pub fn take_events(&mut self) -> Option<mpsc::Receiver<PublishEvent>> {
        self.events_rx.take()
    }

    pub fn settings(&self) -> &PublishSettings {
        &self.settings
    }

    /// Publishes the directory at `build_path`.
    pub async fn publish(&self, build_path: &Path) -> Result<PublishResult, PublishError> {
        match self.run(build_path).await {
            Ok(result) => {
                self.emit(PublishEvent::Completed { cid: result.cid });
                info!(cid = %result.cid, pinned = result.pinned, warnings = result.warnings.len(), "publish completed");
                Ok(result)
            }
            Err(e) => {
                self.emit(PublishEvent::Failed {
                    error: e.to_string(),
                });
                error!(error = %e, "publish failed");
                Err(e)
            }
        }
    }

    /// Publishes `new_path` as the successor of `previous`.
    ///
    /// `previous` is left pinned and untouched, so both versions stay
    /// retrievable.
    pub async fn republish(
        &self,
        previous: &ContentId,
        new_path: &Path,
    ) -> Result<PublishResult, PublishError> {
        info!(previous = %previous, path = %new_path.display(), "updating published content");
        let result = self.publish(new_path).await?;

        if result.cid.same_content(previous) {
            info!(cid = %result.cid, "content unchanged since previous publish");
        } else {
            info!(previous = %previous, current = %result.cid, "keeping previous version for history");
        }
        Ok(result)
    }

    async fn run(&self, build_path: &Path) -> Result<PublishResult, PublishError> {
        self.emit(PublishEvent::Stage(PublishStage::CheckingBuild));
        check_build_dir(build_path)?;

        let mut warnings = Vec::new();

        // Health is advisory: an offline node is reported, not refused.
        self.emit(PublishEvent::Stage(PublishStage::HealthCheck));
        let health = self
            .store
            .health_check()
            .await
            .map_err(PublishError::Initialization)?;
        if !health.online {
            self.push_warning(&mut warnings, PublishWarning::Unhealthy(health));
        }

        self.emit(PublishEvent::Stage(PublishStage::Ingesting));
        let cid = self
            .store
            .ingest_directory(build_path)
            .await
            .map_err(|source| match source {
                StoreError::Initialization { .. } => PublishError::Initialization(source),
                source => PublishError::Ingest {
                    path: build_path.to_path_buf(),
                    source,
                },
            })?;

        let urls = self.settings.gateways.urls_for(&cid);
        let ipfs_url = canonical_url(&cid);

        self.emit(PublishEvent::Stage(PublishStage::Announcing));
        if let Err(e) = self.store.announce(&cid).await {
            self.push_warning(&mut warnings, PublishWarning::Announce(e.to_string()));
        }

        let mut pinned = false;
        if self.settings.auto_pin {
            self.emit(PublishEvent::Stage(PublishStage::Pinning));
            match self.store.pin(&cid).await {
                Ok(()) => pinned = true,
                Err(e) => self.push_warning(&mut warnings, PublishWarning::Pin(e.to_string())),
            }
        }

        let mut result = PublishResult {
            cid,
            urls,
            ipfs_url,
            pinned,
            warnings,
        };

        self.emit(PublishEvent::Stage(PublishStage::Recording));
        let record = DeploymentRecord::from_result(&result, &self.settings.version);
        if let Err(e) = self.recorder.record(&record).await {
            let warning = PublishWarning::Record(e.to_string());
            self.push_warning(&mut result.warnings, warning);
        }

        Ok(result)
    }

    fn push_warning(&self, warnings: &mut Vec<PublishWarning>, warning: PublishWarning) {
        warn!(warning = %warning, "publish degraded");
        self.emit(PublishEvent::Warning(warning.clone()));
        warnings.push(warning);
    }

    fn emit(&self, event: PublishEvent) {
        // Never block the pipeline on a slow or absent listener.
        let _ = self.events_tx.try_send(event);
    }
}

/// The build directory must exist and contain at least one entry.
fn check_build_dir(path: &Path) -> Result<(), PublishError> {
    let reason = if !path.exists() {
        "does not exist"
    } else if !path.is_dir() {
        "is not a directory"
    } else if !is_non_empty_dir(path) {
        "is empty"
    } else {
        return Ok(());
    };

    Err(PublishError::Precondition {
        path: path.to_path_buf(),
        reason: reason.into(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};

    use umcdeploy_content_store::{
        BoxFuture, DirEntry, HealthStatus, MemoryStore, StoreBackend, StoreConfig,
        StoreConnector,
    };

    use crate::error::PersistenceError;
    use crate::gateway::GatewayConfig;

    #[derive(Default)]
    struct SpyState {
        calls: Mutex<Vec<String>>,
        fail_ingest: bool,
        fail_pin: bool,
        offline: bool,
    }

    impl SpyState {
        fn calls(&self) -> Vec<String> {
            self.calls.lock().unwrap().clone()
        }

        fn log(&self, call: String) {
            self.calls.lock().unwrap().push(call);
        }
    }

    /// Memory-backed store that logs every call and can be told to fail.
    #[derive(Clone)]
    struct SpyBackend {
        store: MemoryStore,
        state: Arc<SpyState>,
    }

    impl StoreBackend for SpyBackend {
        fn add_directory<'a>(
            &'a self,
            path: &'a Path,
        ) -> BoxFuture<'a, Result<ContentId, StoreError>> {
            Box::pin(async move {
                self.state.log("add".into());
                if self.state.fail_ingest {
                    return Err(StoreError::Api {
                        status: 503,
                        message: "network unreachable".into(),
                    });
                }
                self.store.add_directory(path).await
            })
        }

        fn pin<'a>(&'a self, cid: &'a ContentId) -> BoxFuture<'a, Result<(), StoreError>> {
            Box::pin(async move {
                self.state.log(format!("pin:{cid}"));
                if self.state.fail_pin {
                    return Err(StoreError::Api {
                        status: 402,
                        message: "quota exceeded".into(),
                    });
                }
                self.store.pin(cid).await
            })
        }

        fn cat<'a>(
            &'a self,
            cid: &'a ContentId,
            path: &'a str,
        ) -> BoxFuture<'a, Result<Vec<u8>, StoreError>> {
            self.store.cat(cid, path)
        }

        fn ls<'a>(
            &'a self,
            cid: &'a ContentId,
        ) -> BoxFuture<'a, Result<Vec<DirEntry>, StoreError>> {
            self.store.ls(cid)
        }

        fn health(&self) -> BoxFuture<'_, HealthStatus> {
            Box::pin(async move {
                self.state.log("health".into());
                if self.state.offline {
                    HealthStatus::offline()
                } else {
                    self.store.health().await
                }
            })
        }

        fn announce<'a>(&'a self, cid: &'a ContentId) -> BoxFuture<'a, Result<(), StoreError>> {
            Box::pin(async move {
                self.state.log(format!("announce:{cid}"));
                self.store.announce(cid).await
            })
        }
    }

    struct SpyConnector {
        backend: SpyBackend,
        connects: Arc<AtomicUsize>,
    }

    impl StoreConnector for SpyConnector {
        fn connect<'a>(
            &'a self,
            _config: &'a StoreConfig,
        ) -> BoxFuture<'a, Result<Box<dyn StoreBackend>, StoreError>> {
            Box::pin(async move {
                self.connects.fetch_add(1, Ordering::SeqCst);
                Ok(Box::new(self.backend.clone()) as Box<dyn StoreBackend>)
            })
        }
    }

    #[derive(Default)]
    struct SpyRecorder {
        records: Mutex<Vec<DeploymentRecord>>,
        fail: bool,
    }

    impl SpyRecorder {
        fn failing() -> Self {
            Self {
                fail: true,
                ..Self::default()
            }
        }

        fn records(&self) -> Vec<DeploymentRecord> {
            self.records.lock().unwrap().clone()
        }
    }

    impl DeploymentRecorder for SpyRecorder {
        fn record<'a>(
            &'a self,
            record: &'a DeploymentRecord,
        ) -> BoxFuture<'a, Result<(), PersistenceError>> {
            Box::pin(async move {
                if self.fail {
                    return Err(PersistenceError {
                        path: "/read-only/deployment.json".into(),
                        source: std::io::Error::from(std::io::ErrorKind::PermissionDenied),
                    });
                }
                self.records.lock().unwrap().push(record.clone());
                Ok(())
            })
        }
    }

    struct Harness {
        client: ContentStoreClient,
        store: MemoryStore,
        state: Arc<SpyState>,
        connects: Arc<AtomicUsize>,
    }

    fn harness(state: SpyState) -> Harness {
        let store = MemoryStore::new();
        let state = Arc::new(state);
        let connects = Arc::new(AtomicUsize::new(0));
        let connector = SpyConnector {
            backend: SpyBackend {
                store: store.clone(),
                state: Arc::clone(&state),
            },
            connects: Arc::clone(&connects),
        };
        Harness {
            client: ContentStoreClient::new(StoreConfig::default(), Box::new(connector)),
            store,
            state,
            connects,
        }
    }

    fn settings(auto_pin: bool) -> PublishSettings {
        PublishSettings {
            gateways: GatewayConfig::new([
                "https://g1.example/ipfs/",
                "https://g2.example/ipfs/",
                "https://g3.example/ipfs/",
            ]),
            auto_pin,
            version: "1.4.0".into(),
        }
    }

    fn build_dir(marker: &str) -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("index.html"), format!("<h1>{marker}</h1>")).unwrap();
        fs::create_dir(dir.path().join("assets")).unwrap();
        fs::write(dir.path().join("assets").join("main.js"), b"init()").unwrap();
        dir
    }

    #[tokio::test]
    async fn publish_returns_urls_in_gateway_order() {
        let h = harness(SpyState::default());
        let recorder = SpyRecorder::default();
        let orch = PublishOrchestrator::new(&h.client, &recorder, settings(true));
        let dir = build_dir("v1");

        let result = orch.publish(dir.path()).await.unwrap();
        let cid = result.cid.to_string();

        assert_eq!(
            result.urls,
            vec![
                format!("https://g1.example/ipfs/{cid}"),
                format!("https://g2.example/ipfs/{cid}"),
                format!("https://g3.example/ipfs/{cid}"),
            ]
        );
        assert_eq!(result.ipfs_url, format!("ipfs://{cid}"));
        assert!(!result.urls.contains(&result.ipfs_url));
        assert!(result.pinned);
        assert!(result.is_clean());
        assert!(h.store.is_pinned(&result.cid));

        let records = recorder.records();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].cid, result.cid);
        assert_eq!(records[0].urls, result.urls);
        assert_eq!(records[0].ipfs_url, result.ipfs_url);
        assert_eq!(records[0].version, "1.4.0");
    }

    #[tokio::test]
    async fn publishing_same_content_twice_is_deterministic() {
        let h = harness(SpyState::default());
        let recorder = SpyRecorder::default();
        let orch = PublishOrchestrator::new(&h.client, &recorder, settings(false));

        let first = orch.publish(build_dir("same").path()).await.unwrap();
        let second = orch.publish(build_dir("same").path()).await.unwrap();
        let changed = orch.publish(build_dir("other").path()).await.unwrap();

        assert_eq!(first.cid, second.cid);
        assert_ne!(first.cid, changed.cid);
        assert_eq!(h.connects.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn pin_failure_is_not_fatal() {
        let h = harness(SpyState {
            fail_pin: true,
            ..SpyState::default()
        });
        let recorder = SpyRecorder::default();
        let orch = PublishOrchestrator::new(&h.client, &recorder, settings(true));
        let dir = build_dir("v1");

        let result = orch.publish(dir.path()).await.unwrap();

        assert!(!result.pinned);
        assert_eq!(result.urls.len(), 3);
        assert!(matches!(result.warnings.as_slice(), [PublishWarning::Pin(_)]));
        assert_eq!(recorder.records().len(), 1);
    }

    #[tokio::test]
    async fn ingest_failure_is_fatal_and_unrecorded() {
        let h = harness(SpyState {
            fail_ingest: true,
            ..SpyState::default()
        });
        let recorder = SpyRecorder::default();
        let orch = PublishOrchestrator::new(&h.client, &recorder, settings(true));
        let dir = build_dir("v1");

        let err = orch.publish(dir.path()).await.unwrap_err();

        assert!(matches!(err, PublishError::Ingest { .. }));
        assert!(recorder.records().is_empty());
        assert!(!h.state.calls().iter().any(|c| c.starts_with("pin:")));
    }

    #[tokio::test]
    async fn missing_build_makes_no_store_calls() {
        let h = harness(SpyState::default());
        let recorder = SpyRecorder::default();
        let orch = PublishOrchestrator::new(&h.client, &recorder, settings(true));

        let err = orch
            .publish(Path::new("/nonexistent"))
            .await
            .unwrap_err();

        assert!(matches!(err, PublishError::Precondition { .. }));
        assert!(h.state.calls().is_empty());
        assert_eq!(h.connects.load(Ordering::SeqCst), 0);
        assert!(recorder.records().is_empty());
    }

    #[tokio::test]
    async fn empty_build_is_precondition_error() {
        let h = harness(SpyState::default());
        let recorder = SpyRecorder::default();
        let orch = PublishOrchestrator::new(&h.client, &recorder, settings(true));
        let dir = tempfile::tempdir().unwrap();

        let err = orch.publish(dir.path()).await.unwrap_err();
        match err {
            PublishError::Precondition { reason, .. } => assert_eq!(reason, "is empty"),
            other => panic!("expected precondition error, got {other:?}"),
        }
        assert!(h.state.calls().is_empty());
    }

    #[tokio::test]
    async fn record_failure_is_not_fatal() {
        let h = harness(SpyState::default());
        let recorder = SpyRecorder::failing();
        let orch = PublishOrchestrator::new(&h.client, &recorder, settings(true));
        let dir = build_dir("v1");

        let result = orch.publish(dir.path()).await.unwrap();
        assert!(result.pinned);
        assert!(matches!(result.warnings.as_slice(), [PublishWarning::Record(_)]));
    }

    #[tokio::test]
    async fn unhealthy_store_is_advisory() {
        let h = harness(SpyState {
            offline: true,
            ..SpyState::default()
        });
        let recorder = SpyRecorder::default();
        let orch = PublishOrchestrator::new(&h.client, &recorder, settings(true));
        let dir = build_dir("v1");

        let result = orch.publish(dir.path()).await.unwrap();
        assert!(matches!(
            result.warnings.as_slice(),
            [PublishWarning::Unhealthy(_)]
        ));
        assert_eq!(recorder.records().len(), 1);
    }

    #[tokio::test]
    async fn auto_pin_disabled_skips_pinning() {
        let h = harness(SpyState::default());
        let recorder = SpyRecorder::default();
        let orch = PublishOrchestrator::new(&h.client, &recorder, settings(false));
        let dir = build_dir("v1");

        let result = orch.publish(dir.path()).await.unwrap();
        assert!(!result.pinned);
        assert!(result.is_clean());
        assert!(!h.state.calls().iter().any(|c| c.starts_with("pin:")));
    }

    #[tokio::test]
    async fn pipeline_order() {
        let h = harness(SpyState::default());
        let recorder = SpyRecorder::default();
        let orch = PublishOrchestrator::new(&h.client, &recorder, settings(true));
        let dir = build_dir("v1");

        let result = orch.publish(dir.path()).await.unwrap();
        let cid = result.cid.to_string();
        assert_eq!(
            h.state.calls(),
            vec![
                "health".to_string(),
                "add".to_string(),
                format!("announce:{cid}"),
                format!("pin:{cid}"),
            ]
        );
    }

    #[tokio::test]
    async fn republish_keeps_previous_version() {
        let h = harness(SpyState::default());
        let recorder = SpyRecorder::default();
        let orch = PublishOrchestrator::new(&h.client, &recorder, settings(true));

        let old_dir = build_dir("v1");
        let old = orch.publish(old_dir.path()).await.unwrap();

        let new_dir = build_dir("v2");
        let new = orch.republish(&old.cid, new_dir.path()).await.unwrap();

        assert_ne!(new.cid, old.cid);
        assert!(h.store.is_pinned(&old.cid));
        assert!(h.store.is_pinned(&new.cid));

        // After the first publish, nothing touched the old identifier.
        let old_cid = old.cid.to_string();
        let calls = h.state.calls();
        let second_publish = &calls[4..];
        assert!(second_publish.iter().all(|c| !c.contains(&old_cid)));

        // Both versions remain retrievable.
        let old_bytes = h.client.retrieve(&old.cid, "index.html").await.unwrap();
        let new_bytes = h.client.retrieve(&new.cid, "index.html").await.unwrap();
        assert_eq!(old_bytes, b"<h1>v1</h1>");
        assert_eq!(new_bytes, b"<h1>v2</h1>");
    }

    #[tokio::test]
    async fn events_trace_the_pipeline() {
        let h = harness(SpyState {
            fail_pin: true,
            ..SpyState::default()
        });
        let recorder = SpyRecorder::default();
        let mut orch = PublishOrchestrator::new(&h.client, &recorder, settings(true));
        let mut events_rx = orch.take_events().unwrap();
        assert!(orch.take_events().is_none());

        let dir = build_dir("v1");
        orch.publish(dir.path()).await.unwrap();
        drop(orch);

        let mut stages = Vec::new();
        let mut saw_warning = false;
        let mut saw_completed = false;
        while let Some(event) = events_rx.recv().await {
            match event {
                PublishEvent::Stage(stage) => stages.push(stage),
                PublishEvent::Warning(PublishWarning::Pin(_)) => saw_warning = true,
                PublishEvent::Completed { .. } => saw_completed = true,
                _ => {}
            }
        }

        assert_eq!(
            stages,
            vec![
                PublishStage::CheckingBuild,
                PublishStage::HealthCheck,
                PublishStage::Ingesting,
                PublishStage::Announcing,
                PublishStage::Pinning,
                PublishStage::Recording,
            ]
        );
        assert!(saw_warning);
        assert!(saw_completed);
    }
}
