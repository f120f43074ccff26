//! Kubo RPC backend.
//!
//! Async HTTP client for an IPFS node's RPC API using `reqwest`. Every
//! RPC endpoint is a `POST` to `{api_url}/api/v0/{endpoint}`; errors come
//! back as `{"Message", "Code", "Type"}` JSON bodies.

use std::path::Path;

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use percent_encoding::{AsciiSet, NON_ALPHANUMERIC, utf8_percent_encode};
use reqwest::multipart::{Form, Part};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use tracing::{debug, info, warn};

use crate::backend::{
    BoxFuture, DirEntry, EntryKind, HealthStatus, StoreBackend, StoreConnector,
};
use crate::config::{RoutingConfig, StoreConfig};
use crate::content_id::ContentId;
use crate::error::StoreError;
use crate::scanner::scan_tree;

/// Bytes left as-is in multipart file names; the node query-unescapes
/// every name it receives.
const FILENAME_SAFE: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'~');

/// Escapes each segment of a `/`-separated relative path.
fn escape_file_name(relative_path: &str) -> String {
    relative_path
        .split('/')
        .map(|segment| utf8_percent_encode(segment, FILENAME_SAFE).to_string())
        .collect::<Vec<_>>()
        .join("/")
}

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    #[serde(rename = "Message", default)]
    message: String,
}

#[derive(Debug, Deserialize)]
struct VersionResponse {
    #[serde(rename = "Version")]
    version: String,
}

#[derive(Debug, Deserialize)]
struct AddEvent {
    #[serde(rename = "Name", default)]
    name: String,
    #[serde(rename = "Hash")]
    hash: Option<String>,
}

#[derive(Debug, Deserialize)]
struct LsResponse {
    #[serde(rename = "Objects", default)]
    objects: Vec<LsObject>,
}

#[derive(Debug, Deserialize)]
struct LsObject {
    #[serde(rename = "Links", default)]
    links: Vec<LsLink>,
}

#[derive(Debug, Deserialize)]
struct LsLink {
    #[serde(rename = "Name")]
    name: String,
    #[serde(rename = "Hash")]
    hash: String,
    #[serde(rename = "Size", default)]
    size: u64,
    #[serde(rename = "Type", default)]
    kind: i32,
}

#[derive(Debug, Deserialize)]
struct IdResponse {
    #[serde(rename = "ID")]
    id: String,
    #[serde(rename = "Protocols", default)]
    protocols: Option<Vec<String>>,
}

#[derive(Debug, Deserialize)]
struct PeersResponse {
    #[serde(rename = "Peers", default)]
    peers: Option<Vec<serde_json::Value>>,
}

/// Backend speaking to a Kubo node.
pub struct KuboBackend {
    http: reqwest::Client,
    api_base: String,
    routing: RoutingConfig,
}

impl KuboBackend {
    /// Creates a backend for the node at `config.api_url`.
    ///
    /// No request is made; use [`KuboConnector`] to verify reachability.
    pub fn new(config: &StoreConfig) -> Result<Self, StoreError> {
        let http = reqwest::Client::builder().build()?;
        Ok(Self {
            http,
            api_base: format!("{}/api/v0", config.api_url.trim().trim_end_matches('/')),
            routing: config.routing.clone(),
        })
    }

    /// Performs an RPC call and returns the raw response body.
    async fn post(
        &self,
        endpoint: &str,
        params: &[(&str, String)],
        form: Option<Form>,
    ) -> Result<Vec<u8>, StoreError> {
        let url = format!("{}/{}", self.api_base, endpoint);
        let mut req = self.http.post(&url).query(params);
        if let Some(form) = form {
            req = req.multipart(form);
        }

        let resp = req.send().await?;
        let status = resp.status();

        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(api_error(status.as_u16(), &body));
        }

        Ok(resp.bytes().await?.to_vec())
    }

    /// Performs an RPC call and decodes a single JSON response.
    async fn rpc<T: DeserializeOwned>(
        &self,
        endpoint: &str,
        params: &[(&str, String)],
    ) -> Result<T, StoreError> {
        let body = self.post(endpoint, params, None).await?;
        Ok(serde_json::from_slice(&body)?)
    }

    /// Returns the node's version string.
    pub async fn version(&self) -> Result<String, StoreError> {
        let resp: VersionResponse = self.rpc("version", &[]).await?;
        Ok(resp.version)
    }

    async fn add_tree(&self, root: &Path) -> Result<ContentId, StoreError> {
        let entries = tokio::task::spawn_blocking({
            let root = root.to_path_buf();
            move || scan_tree(&root)
        })
        .await
        .map_err(|e| StoreError::Io(std::io::Error::other(format!("task join error: {e}"))))??;

        // Parents precede their children, as the multipart reader requires.
        let mut form = Form::new();
        for entry in &entries {
            let part = match entry.kind {
                EntryKind::Directory => Part::bytes(Vec::new())
                    .file_name(escape_file_name(&entry.relative_path))
                    .mime_str("application/x-directory")?,
                _ => {
                    let data = tokio::fs::read(&entry.absolute_path).await?;
                    Part::bytes(data)
                        .file_name(escape_file_name(&entry.relative_path))
                        .mime_str("application/octet-stream")?
                }
            };
            form = form.part("file", part);
        }

        let params = [
            ("wrap-with-directory", "true".to_string()),
            ("cid-version", "1".to_string()),
            ("pin", "false".to_string()),
        ];
        let body = self.post("add", &params, Some(form)).await?;

        // One JSON object per line; the wrapper directory has an empty name.
        let mut root_hash = None;
        for line in body.split(|b| *b == b'\n').filter(|l| !l.is_empty()) {
            let event: AddEvent = serde_json::from_slice(line)?;
            if event.name.is_empty() && event.hash.is_some() {
                root_hash = event.hash;
            }
        }

        let root_hash = root_hash.ok_or_else(|| StoreError::Ingest {
            path: root.to_path_buf(),
            reason: "node did not report a root directory".into(),
        })?;

        debug!(files = entries.len(), root = %root_hash, "add complete");
        ContentId::parse(&root_hash)
    }

    async fn provide(&self, cid: &ContentId) -> Result<(), StoreError> {
        self.post("routing/provide", &[("arg", cid.to_string())], None)
            .await?;
        Ok(())
    }

    async fn publish_update(&self, cid: &ContentId) -> Result<(), StoreError> {
        // Topics travel multibase-encoded (`u` = base64url, no padding).
        let topic = format!("u{}", URL_SAFE_NO_PAD.encode(self.routing.topic.as_bytes()));
        let form = Form::new().part(
            "file",
            Part::bytes(cid.to_string().into_bytes()).file_name("data"),
        );
        self.post("pubsub/pub", &[("arg", topic)], Some(form))
            .await?;
        Ok(())
    }
}

/// Maps a non-2xx RPC response to a store error.
fn api_error(status: u16, body: &str) -> StoreError {
    let message = serde_json::from_str::<ApiErrorBody>(body)
        .map(|b| b.message)
        .unwrap_or_else(|_| body.trim().to_string());

    let lower = message.to_lowercase();
    if lower.contains("no link named")
        || lower.contains("not found")
        || lower.contains("does not exist")
    {
        return StoreError::not_found(message);
    }

    StoreError::Api { status, message }
}

fn entry_kind(kind: i32) -> EntryKind {
    match kind {
        1 => EntryKind::Directory,
        2 => EntryKind::File,
        _ => EntryKind::Other,
    }
}

impl StoreBackend for KuboBackend {
    fn add_directory<'a>(&'a self, path: &'a Path) -> BoxFuture<'a, Result<ContentId, StoreError>> {
        Box::pin(async move {
            self.add_tree(path).await.map_err(|e| match e {
                StoreError::NotFound { .. } | StoreError::Ingest { .. } => e,
                other => StoreError::Ingest {
                    path: path.to_path_buf(),
                    reason: other.to_string(),
                },
            })
        })
    }

    fn pin<'a>(&'a self, cid: &'a ContentId) -> BoxFuture<'a, Result<(), StoreError>> {
        Box::pin(async move {
            self.post("pin/add", &[("arg", cid.to_string())], None)
                .await?;
            Ok(())
        })
    }

    fn cat<'a>(
        &'a self,
        cid: &'a ContentId,
        path: &'a str,
    ) -> BoxFuture<'a, Result<Vec<u8>, StoreError>> {
        Box::pin(async move {
            let path = path.trim_matches('/');
            let target = if path.is_empty() {
                cid.to_string()
            } else {
                format!("{cid}/{path}")
            };
            self.post("cat", &[("arg", target)], None).await
        })
    }

    fn ls<'a>(&'a self, cid: &'a ContentId) -> BoxFuture<'a, Result<Vec<DirEntry>, StoreError>> {
        Box::pin(async move {
            let resp: LsResponse = self.rpc("ls", &[("arg", cid.to_string())]).await?;
            resp.objects
                .into_iter()
                .flat_map(|object| object.links)
                .map(|link| {
                    Ok(DirEntry {
                        cid: ContentId::parse(&link.hash)?,
                        name: link.name,
                        kind: entry_kind(link.kind),
                        size: link.size,
                    })
                })
                .collect()
        })
    }

    fn health(&self) -> BoxFuture<'_, HealthStatus> {
        Box::pin(async move {
            let id: IdResponse = match self.rpc("id", &[]).await {
                Ok(id) => id,
                Err(e) => {
                    warn!(error = %e, "node identity unavailable");
                    return HealthStatus::offline();
                }
            };

            let connections = match self.rpc::<PeersResponse>("swarm/peers", &[]).await {
                Ok(resp) => resp.peers.map_or(0, |p| p.len()),
                Err(e) => {
                    debug!(error = %e, "peer list unavailable");
                    0
                }
            };

            HealthStatus {
                node_id: id.id,
                online: true,
                connections,
                protocols: id.protocols.unwrap_or_default(),
            }
        })
    }

    fn announce<'a>(&'a self, cid: &'a ContentId) -> BoxFuture<'a, Result<(), StoreError>> {
        Box::pin(async move {
            let mut failures = Vec::new();

            if self.routing.dht {
                match self.provide(cid).await {
                    Ok(()) => debug!(cid = %cid, "provided to DHT"),
                    Err(e) => failures.push(format!("dht: {e}")),
                }
            }
            if self.routing.pubsub {
                match self.publish_update(cid).await {
                    Ok(()) => debug!(cid = %cid, topic = %self.routing.topic, "published update"),
                    Err(e) => failures.push(format!("pubsub: {e}")),
                }
            }

            if failures.is_empty() {
                Ok(())
            } else {
                Err(StoreError::Announce {
                    cid: cid.to_string(),
                    failures,
                })
            }
        })
    }
}

/// Connects to a Kubo node, verifying it answers before handing it out.
#[derive(Debug, Clone, Copy, Default)]
pub struct KuboConnector;

impl StoreConnector for KuboConnector {
    fn connect<'a>(
        &'a self,
        config: &'a StoreConfig,
    ) -> BoxFuture<'a, Result<Box<dyn StoreBackend>, StoreError>> {
        Box::pin(async move {
            let backend = KuboBackend::new(config)
                .map_err(|e| StoreError::init(format!("HTTP client: {e}")))?;

            let version = backend.version().await.map_err(|e| {
                StoreError::init(format!("cannot reach node at {}: {e}", config.api_url))
            })?;

            info!(
                api = %config.api_url,
                version = %version,
                dht = config.routing.dht,
                pubsub = config.routing.pubsub,
                "connected to Kubo node"
            );
            Ok(Box::new(backend) as Box<dyn StoreBackend>)
        })
    }
}
