//! Static node and storage lookup
//!
//! Resolves names against fixed tables, typically built from the
//! reconciler settings file.

use async_trait::async_trait;
use std::collections::BTreeMap;
use tracing::debug;

use super::{NodeHandle, NodeLookup, StorageHandle};
use crate::{ReconcileError, settings::Settings};

/// Lookup over a fixed set of nodes and storages
#[derive(Debug, Clone, Default)]
pub struct StaticLookup {
    nodes: BTreeMap<String, NodeHandle>,
    storages: BTreeMap<String, StorageHandle>,
}

impl StaticLookup {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a lookup that knows the node and storage named in `settings`
    pub fn from_settings(settings: &Settings) -> Self {
        Self::new()
            .with_node(&settings.node)
            .with_storage(&settings.storage.name, &settings.storage.path)
    }

    /// Register a node
    pub fn with_node(mut self, name: &str) -> Self {
        self.nodes.insert(name.to_string(), NodeHandle::new(name));
        self
    }

    /// Register a storage backend rooted at `path`
    pub fn with_storage(mut self, name: &str, path: &str) -> Self {
        self.storages
            .insert(name.to_string(), StorageHandle::new(name, path));
        self
    }
}

#[async_trait]
impl NodeLookup for StaticLookup {
    async fn node(&self, name: &str) -> Result<NodeHandle, ReconcileError> {
        debug!("Looking up node {}", name);
        self.nodes
            .get(name)
            .cloned()
            .ok_or_else(|| ReconcileError::Lookup(format!("node not found: {}", name)))
    }

    async fn storage(&self, name: &str) -> Result<StorageHandle, ReconcileError> {
        debug!("Looking up storage {}", name);
        self.storages
            .get(name)
            .cloned()
            .ok_or_else(|| ReconcileError::Lookup(format!("storage not found: {}", name)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_lookup_known_names() {
        let lookup = StaticLookup::new()
            .with_node("pve1")
            .with_storage("local", "/var/lib/vz");

        assert_eq!(lookup.node("pve1").await.unwrap(), NodeHandle::new("pve1"));

        let storage = lookup.storage("local").await.unwrap();
        assert_eq!(storage.path, "/var/lib/vz");
        assert!(storage.node.is_none());
    }

    #[tokio::test]
    async fn test_lookup_unknown_names() {
        let lookup = StaticLookup::new();

        let err = lookup.node("pve9").await.unwrap_err();
        assert!(matches!(err, ReconcileError::Lookup(_)));
        assert!(err.to_string().contains("pve9"));

        assert!(matches!(
            lookup.storage("nfs").await,
            Err(ReconcileError::Lookup(_))
        ));
    }

    #[tokio::test]
    async fn test_from_settings() {
        let settings =
            Settings::from_yaml("node: pve2\nstorage:\n  name: cephfs\n  path: /mnt/pve/cephfs\n")
                .unwrap();
        let lookup = StaticLookup::from_settings(&settings);

        assert!(lookup.node("pve2").await.is_ok());
        assert_eq!(
            lookup.storage("cephfs").await.unwrap().path,
            "/mnt/pve/cephfs"
        );
    }
}
