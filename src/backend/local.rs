//! Local filesystem transport
//!
//! Writes snippets straight to the filesystem of the host running the
//! reconciler. Suitable when the storage root is a locally mounted share
//! (NFS, CephFS) or the reconciler runs on the node itself.

use async_trait::async_trait;
use std::path::{Component, Path, PathBuf};
use tokio::fs;
use tracing::{debug, info};

use super::{NodeHandle, StorageHandle, Transport, TransportSession};
use crate::{ReconcileError, paths};

/// Transport backed by the local filesystem
#[derive(Debug, Clone, Default)]
pub struct LocalTransport;

impl LocalTransport {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Transport for LocalTransport {
    fn name(&self) -> &'static str {
        "local"
    }

    async fn connect(
        &self,
        node: &NodeHandle,
    ) -> Result<Box<dyn TransportSession>, ReconcileError> {
        debug!("Opening local session for node {}", node.name);
        Ok(Box::new(LocalSession {
            node: node.name.clone(),
        }))
    }
}

struct LocalSession {
    node: String,
}

impl Drop for LocalSession {
    fn drop(&mut self) {
        debug!("Closing local session for node {}", self.node);
    }
}

#[async_trait]
impl TransportSession for LocalSession {
    async fn write_file(&mut self, path: &str, content: &[u8]) -> Result<(), ReconcileError> {
        info!("Writing file: {}", path);

        let path = Path::new(path);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await?;
        }
        fs::write(path, content).await?;
        Ok(())
    }

    async fn delete_volume(
        &mut self,
        storage: &StorageHandle,
        volume_id: &str,
    ) -> Result<(), ReconcileError> {
        let path = resolve_volume(storage, volume_id)?;
        info!("Deleting volume {} ({})", volume_id, path.display());
        fs::remove_file(&path).await?;
        Ok(())
    }
}

/// Map a volume identifier to a file below the storage root
fn resolve_volume(storage: &StorageHandle, volume_id: &str) -> Result<PathBuf, ReconcileError> {
    let (storage_name, relative) = paths::parse_volume_id(volume_id).ok_or_else(|| {
        ReconcileError::Transport(format!("malformed volume id: {}", volume_id))
    })?;

    if storage_name != storage.name {
        return Err(ReconcileError::Transport(format!(
            "volume {} does not belong to storage {}",
            volume_id, storage.name
        )));
    }

    let relative = Path::new(relative);
    if !relative
        .components()
        .all(|c| matches!(c, Component::Normal(_)))
    {
        return Err(ReconcileError::Transport(format!(
            "volume path escapes storage root: {}",
            volume_id
        )));
    }

    Ok(Path::new(&storage.path).join(relative))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn storage(root: &Path) -> StorageHandle {
        StorageHandle::new("local", root.to_string_lossy())
    }

    #[tokio::test]
    async fn test_write_creates_parent_dirs() {
        let temp = TempDir::new().unwrap();
        let target = temp.path().join("snippets/node-user.yml");

        let transport = LocalTransport::new();
        let mut session = transport.connect(&NodeHandle::new("pve")).await.unwrap();
        session
            .write_file(&target.to_string_lossy(), b"#cloud-config\n")
            .await
            .unwrap();

        assert_eq!(
            fs::read_to_string(&target).await.unwrap(),
            "#cloud-config\n"
        );
    }

    #[tokio::test]
    async fn test_write_replaces_existing_file() {
        let temp = TempDir::new().unwrap();
        let target = temp.path().join("user.yml");
        fs::write(&target, "old content that is longer").await.unwrap();

        let mut session = LocalTransport::new()
            .connect(&NodeHandle::new("pve"))
            .await
            .unwrap();
        session
            .write_file(&target.to_string_lossy(), b"new")
            .await
            .unwrap();

        assert_eq!(fs::read_to_string(&target).await.unwrap(), "new");
    }

    #[tokio::test]
    async fn test_delete_volume() {
        let temp = TempDir::new().unwrap();
        let dir = temp.path().join("snippets");
        fs::create_dir_all(&dir).await.unwrap();
        fs::write(dir.join("a-user.yml"), "x").await.unwrap();

        let mut session = LocalTransport::new()
            .connect(&NodeHandle::new("pve"))
            .await
            .unwrap();
        session
            .delete_volume(&storage(temp.path()), "local:snippets/a-user.yml")
            .await
            .unwrap();

        assert!(!dir.join("a-user.yml").exists());
    }

    #[tokio::test]
    async fn test_delete_missing_volume_fails() {
        let temp = TempDir::new().unwrap();
        let mut session = LocalTransport::new()
            .connect(&NodeHandle::new("pve"))
            .await
            .unwrap();

        let err = session
            .delete_volume(&storage(temp.path()), "local:snippets/gone-user.yml")
            .await
            .unwrap_err();
        assert!(matches!(err, ReconcileError::Io(_)));
    }

    #[test]
    fn test_resolve_volume_rejects_other_storage() {
        let err = resolve_volume(
            &StorageHandle::new("local", "/srv"),
            "nfs:snippets/a-user.yml",
        )
        .unwrap_err();
        assert!(err.to_string().contains("does not belong"));
    }

    #[test]
    fn test_resolve_volume_rejects_escape() {
        let storage = StorageHandle::new("local", "/srv");
        assert!(resolve_volume(&storage, "local:../etc/passwd").is_err());
        assert!(resolve_volume(&storage, "local:/etc/passwd").is_err());
        assert!(resolve_volume(&storage, "no-colon").is_err());
    }

    #[test]
    fn test_resolve_volume() {
        let path = resolve_volume(
            &StorageHandle::new("local", "/srv"),
            "local:snippets/a-user.yml",
        )
        .unwrap();
        assert_eq!(path, PathBuf::from("/srv/snippets/a-user.yml"));
    }
}
