//! Node lookup and file transport backends
//!
//! The reconciler never talks to a hypervisor directly. It resolves a node
//! and a storage backend through [`NodeLookup`], then opens a
//! [`TransportSession`] on that node to write or delete the snippet.

pub mod local;
pub mod lookup;
pub mod mock;

use async_trait::async_trait;

use crate::ReconcileError;

/// A resolved compute node
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeHandle {
    pub name: String,
}

impl NodeHandle {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

/// A resolved storage backend
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorageHandle {
    /// Storage name, the prefix of every volume identifier on it
    pub name: String,
    /// Root path of the storage on the node's filesystem
    pub path: String,
    /// Node the storage is accessed through, once bound
    pub node: Option<String>,
}

impl StorageHandle {
    pub fn new(name: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            path: path.into(),
            node: None,
        }
    }

    /// Route volume operations on this storage through `node`
    pub fn bind(&mut self, node: &NodeHandle) {
        self.node = Some(node.name.clone());
    }
}

/// Resolves nodes and storage backends by name
#[async_trait]
pub trait NodeLookup: Send + Sync {
    async fn node(&self, name: &str) -> Result<NodeHandle, ReconcileError>;

    async fn storage(&self, name: &str) -> Result<StorageHandle, ReconcileError>;
}

/// Opens file transport sessions on a node
#[async_trait]
pub trait Transport: Send + Sync {
    /// Name of this transport (e.g., "local", "mock")
    fn name(&self) -> &'static str;

    /// Acquire a session on `node`
    ///
    /// The session is released when the returned box is dropped.
    async fn connect(
        &self,
        node: &NodeHandle,
    ) -> Result<Box<dyn TransportSession>, ReconcileError>;
}

/// An open connection to a node's filesystem and storage
#[async_trait]
pub trait TransportSession: Send {
    /// Write `content` to the absolute `path` on the node, replacing any existing file
    async fn write_file(&mut self, path: &str, content: &[u8]) -> Result<(), ReconcileError>;

    /// Delete the volume `volume_id` from `storage`
    async fn delete_volume(
        &mut self,
        storage: &StorageHandle,
        volume_id: &str,
    ) -> Result<(), ReconcileError>;
}
