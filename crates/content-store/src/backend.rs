//! Backend trait and the value types it returns.
//!
//! `StoreBackend` is implemented once per storage technology. Using a
//! trait keeps the client decoupled from transport and testable with
//! mocks; `StoreConnector` is the only place a backend is constructed.

use std::future::Future;
use std::path::Path;
use std::pin::Pin;

use serde::{Deserialize, Serialize};

use crate::config::StoreConfig;
use crate::content_id::ContentId;
use crate::error::StoreError;

/// Boxed future returned by the object-safe traits in this crate.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Operations a content-addressed store must provide.
pub trait StoreBackend: Send + Sync {
    /// Ingests a local directory tree and returns its root identifier.
    fn add_directory<'a>(&'a self, path: &'a Path) -> BoxFuture<'a, Result<ContentId, StoreError>>;

    /// Asks the store to retain `cid` indefinitely.
    fn pin<'a>(&'a self, cid: &'a ContentId) -> BoxFuture<'a, Result<(), StoreError>>;

    /// Reads the bytes at `path` inside the tree rooted at `cid`.
    ///
    /// An empty path reads `cid` itself.
    fn cat<'a>(
        &'a self,
        cid: &'a ContentId,
        path: &'a str,
    ) -> BoxFuture<'a, Result<Vec<u8>, StoreError>>;

    /// Lists one level of the directory `cid`.
    fn ls<'a>(&'a self, cid: &'a ContentId) -> BoxFuture<'a, Result<Vec<DirEntry>, StoreError>>;

    /// Reports connectivity. Unreachable is a status, not an error.
    fn health(&self) -> BoxFuture<'_, HealthStatus>;

    /// Makes `cid` discoverable by peers (routing / subscriptions).
    fn announce<'a>(&'a self, cid: &'a ContentId) -> BoxFuture<'a, Result<(), StoreError>>;
}

/// Constructs a backend from static configuration.
pub trait StoreConnector: Send + Sync {
    fn connect<'a>(
        &'a self,
        config: &'a StoreConfig,
    ) -> BoxFuture<'a, Result<Box<dyn StoreBackend>, StoreError>>;
}

/// Kind of a directory entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryKind {
    File,
    Directory,
    /// Symlinks, raw blocks and anything else the store reports.
    Other,
}

/// One child of a stored directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DirEntry {
    pub name: String,
    pub kind: EntryKind,
    pub size: u64,
    pub cid: ContentId,
}

/// Point-in-time connectivity snapshot.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthStatus {
    /// Peer identity of the node; empty when unreachable.
    pub node_id: String,
    pub online: bool,
    pub connections: usize,
    pub protocols: Vec<String>,
}

impl HealthStatus {
    /// Status reported when the node cannot be reached.
    pub fn offline() -> Self {
        Self::default()
    }
}

/// Entries of a single `ls` call, consumed once.
///
/// Listing again issues a new request to the store.
#[derive(Debug)]
pub struct Listing {
    entries: std::vec::IntoIter<DirEntry>,
}

impl Listing {
    pub(crate) fn new(entries: Vec<DirEntry>) -> Self {
        Self {
            entries: entries.into_iter(),
        }
    }
}

impl Iterator for Listing {
    type Item = DirEntry;

    fn next(&mut self) -> Option<Self::Item> {
        self.entries.next()
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.entries.size_hint()
    }
}

impl ExactSizeIterator for Listing {}
