//! In-process content-addressed store.
//!
//! Files are addressed as CIDv1 `raw` over their bytes; directories as
//! CIDv1 `dag-json` over a canonical, name-sorted link list. The same
//! bytes and tree shape therefore always produce the same identifier.
//! These identifiers are not UnixFS identifiers and will differ from
//! the ones a Kubo node derives for the same tree.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};

use serde::Serialize;
use tracing::debug;

use crate::backend::{
    BoxFuture, DirEntry, EntryKind, HealthStatus, StoreBackend, StoreConnector,
};
use crate::config::StoreConfig;
use crate::content_id::{ContentId, DAG_JSON, RAW};
use crate::error::StoreError;

#[derive(Debug, Clone)]
enum Node {
    File(Vec<u8>),
    Directory(BTreeMap<String, Link>),
}

#[derive(Debug, Clone, Serialize)]
struct Link {
    cid: ContentId,
    size: u64,
    #[serde(skip)]
    kind: EntryKind,
}

#[derive(Debug, Default)]
struct State {
    blocks: HashMap<ContentId, Node>,
    pins: HashSet<ContentId>,
    announced: Vec<ContentId>,
}

/// Shared in-memory store. Clones see the same blocks and pins.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    state: Arc<Mutex<State>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        // A poisoned lock only means a panicking test; the data is still usable.
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Returns `true` if `cid` has been pinned.
    pub fn is_pinned(&self, cid: &ContentId) -> bool {
        self.lock().pins.contains(cid)
    }

    /// Returns every pinned identifier.
    pub fn pins(&self) -> Vec<ContentId> {
        self.lock().pins.iter().copied().collect()
    }

    /// Returns identifiers announced so far, oldest first.
    pub fn announced(&self) -> Vec<ContentId> {
        self.lock().announced.clone()
    }

    /// Stores `path` recursively and returns its identifier and size.
    fn put_tree(&self, path: &Path) -> Result<(ContentId, u64, EntryKind), StoreError> {
        let metadata = std::fs::metadata(path)?;

        if metadata.is_file() {
            let data = std::fs::read(path)?;
            let size = data.len() as u64;
            let cid = ContentId::sha256_v1(RAW, &data);
            self.lock().blocks.insert(cid, Node::File(data));
            return Ok((cid, size, EntryKind::File));
        }

        let mut links = BTreeMap::new();
        for entry in std::fs::read_dir(path)? {
            let entry = entry?;
            let file_type = entry.file_type()?;
            if !(file_type.is_file() || file_type.is_dir()) {
                continue;
            }
            let name = entry.file_name().to_string_lossy().into_owned();
            let (cid, size, kind) = self.put_tree(&entry.path())?;
            links.insert(name, Link { cid, size, kind });
        }

        // Kinds are derivable from the child identifiers' codecs, so only
        // name, cid and size take part in the encoding.
        let encoded = serde_json::to_vec(&links)?;
        let cid = ContentId::sha256_v1(DAG_JSON, &encoded);
        let size = links.values().map(|l| l.size).sum();
        self.lock().blocks.insert(cid, Node::Directory(links));
        Ok((cid, size, EntryKind::Directory))
    }

    fn resolve(&self, cid: &ContentId, path: &str) -> Result<Node, StoreError> {
        let state = self.lock();
        let mut current = *cid;
        for segment in path.split('/').filter(|s| !s.is_empty() && *s != ".") {
            match state.blocks.get(&current) {
                Some(Node::Directory(links)) => match links.get(segment) {
                    Some(link) => current = link.cid,
                    None => return Err(StoreError::not_found(format!("{cid}/{path}"))),
                },
                _ => return Err(StoreError::not_found(format!("{cid}/{path}"))),
            }
        }
        state
            .blocks
            .get(&current)
            .cloned()
            .ok_or_else(|| StoreError::not_found(format!("{cid}/{path}")))
    }
}

impl StoreBackend for MemoryStore {
    fn add_directory<'a>(&'a self, path: &'a Path) -> BoxFuture<'a, Result<ContentId, StoreError>> {
        Box::pin(async move {
            if !path.is_dir() {
                return Err(StoreError::not_found(path.display().to_string()));
            }
            let (cid, size, _) = self.put_tree(path)?;
            debug!(cid = %cid, bytes = size, "stored tree in memory");
            Ok(cid)
        })
    }

    fn pin<'a>(&'a self, cid: &'a ContentId) -> BoxFuture<'a, Result<(), StoreError>> {
        Box::pin(async move {
            let mut state = self.lock();
            if !state.blocks.contains_key(cid) {
                return Err(StoreError::not_found(cid.to_string()));
            }
            state.pins.insert(*cid);
            Ok(())
        })
    }

    fn cat<'a>(
        &'a self,
        cid: &'a ContentId,
        path: &'a str,
    ) -> BoxFuture<'a, Result<Vec<u8>, StoreError>> {
        Box::pin(async move {
            match self.resolve(cid, path)? {
                Node::File(data) => Ok(data),
                Node::Directory(_) => Err(StoreError::Api {
                    status: 500,
                    message: format!("{cid}/{path} is a directory"),
                }),
            }
        })
    }

    fn ls<'a>(&'a self, cid: &'a ContentId) -> BoxFuture<'a, Result<Vec<DirEntry>, StoreError>> {
        Box::pin(async move {
            match self.resolve(cid, "")? {
                Node::Directory(links) => Ok(links
                    .into_iter()
                    .map(|(name, link)| DirEntry {
                        name,
                        kind: link.kind,
                        size: link.size,
                        cid: link.cid,
                    })
                    .collect()),
                Node::File(_) => Ok(Vec::new()),
            }
        })
    }

    fn health(&self) -> BoxFuture<'_, HealthStatus> {
        Box::pin(async move {
            HealthStatus {
                node_id: "memory".into(),
                online: true,
                connections: 0,
                protocols: Vec::new(),
            }
        })
    }

    fn announce<'a>(&'a self, cid: &'a ContentId) -> BoxFuture<'a, Result<(), StoreError>> {
        Box::pin(async move {
            self.lock().announced.push(*cid);
            Ok(())
        })
    }
}

/// Connector handing out clones of one [`MemoryStore`].
#[derive(Debug, Clone, Default)]
pub struct MemoryConnector {
    store: MemoryStore,
}

impl MemoryConnector {
    pub fn new(store: MemoryStore) -> Self {
        Self { store }
    }
}

impl StoreConnector for MemoryConnector {
    fn connect<'a>(
        &'a self,
        _config: &'a StoreConfig,
    ) -> BoxFuture<'a, Result<Box<dyn StoreBackend>, StoreError>> {
        Box::pin(async move { Ok(Box::new(self.store.clone()) as Box<dyn StoreBackend>) })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn site() -> TempDir {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("index.html"), b"<h1>UMC</h1>").unwrap();
        fs::create_dir(dir.path().join("assets")).unwrap();
        fs::write(dir.path().join("assets").join("app.js"), b"console.log(1)").unwrap();
        dir
    }

    #[tokio::test]
    async fn same_tree_same_identifier() {
        let a = site();
        let b = site();
        let store = MemoryStore::new();

        let cid_a = store.add_directory(a.path()).await.unwrap();
        let cid_b = store.add_directory(b.path()).await.unwrap();
        let cid_again = store.add_directory(a.path()).await.unwrap();

        assert_eq!(cid_a, cid_b);
        assert_eq!(cid_a, cid_again);
    }

    #[tokio::test]
    async fn byte_change_changes_identifier() {
        let dir = site();
        let store = MemoryStore::new();
        let before = store.add_directory(dir.path()).await.unwrap();

        fs::write(dir.path().join("assets").join("app.js"), b"console.log(2)").unwrap();
        let after = store.add_directory(dir.path()).await.unwrap();

        assert_ne!(before, after);
    }

    #[tokio::test]
    async fn shape_change_changes_identifier() {
        let dir = site();
        let store = MemoryStore::new();
        let before = store.add_directory(dir.path()).await.unwrap();

        fs::create_dir(dir.path().join("empty")).unwrap();
        let after = store.add_directory(dir.path()).await.unwrap();

        assert_ne!(before, after);
    }

    #[tokio::test]
    async fn cat_and_ls_resolve_paths() {
        let dir = site();
        let store = MemoryStore::new();
        let root = store.add_directory(dir.path()).await.unwrap();

        let bytes = store.cat(&root, "assets/app.js").await.unwrap();
        assert_eq!(bytes, b"console.log(1)");

        let entries = store.ls(&root).await.unwrap();
        let names: Vec<&str> = entries.iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, vec!["assets", "index.html"]);
        assert_eq!(entries[0].kind, EntryKind::Directory);
        assert_eq!(entries[1].kind, EntryKind::File);
        assert_eq!(entries[1].size, b"<h1>UMC</h1>".len() as u64);

        let err = store.cat(&root, "missing.html").await.unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn pin_requires_known_content() {
        let dir = site();
        let store = MemoryStore::new();
        let root = store.add_directory(dir.path()).await.unwrap();

        store.pin(&root).await.unwrap();
        assert!(store.is_pinned(&root));

        let unknown = ContentId::sha256_v1(RAW, b"never stored");
        assert!(store.pin(&unknown).await.unwrap_err().is_not_found());
    }

    #[tokio::test]
    async fn missing_directory_is_not_found() {
        let store = MemoryStore::new();
        let err = store
            .add_directory(Path::new("/nonexistent/dist"))
            .await
            .unwrap_err();
        assert!(err.is_not_found());
    }
}
