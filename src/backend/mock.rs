//! Mock transport for testing
//!
//! Records every write and delete, can be configured to fail, and counts
//! sessions so tests can check that each one is released.

use async_trait::async_trait;
use std::sync::{Arc, Mutex, MutexGuard};

use super::{NodeHandle, StorageHandle, Transport, TransportSession};
use crate::ReconcileError;

/// A file written through a mock session
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedWrite {
    pub node: String,
    pub path: String,
    pub content: String,
}

/// A volume deletion issued through a mock session
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedDelete {
    pub node: String,
    pub storage: String,
    pub volume_id: String,
}

#[derive(Debug, Default)]
struct MockState {
    writes: Vec<RecordedWrite>,
    deletes: Vec<RecordedDelete>,
    sessions_opened: usize,
    sessions_open: usize,
}

/// Mock transport for testing
///
/// Clones share recorded state, so a test can keep one handle and give
/// another to the reconciler.
///
/// # Example
/// ```
/// use cloud_init_reconciler::backend::mock::MockTransport;
///
/// let transport = MockTransport::new().with_write_error("console closed");
/// assert!(transport.writes().is_empty());
/// ```
#[derive(Debug, Clone, Default)]
pub struct MockTransport {
    state: Arc<Mutex<MockState>>,
    connect_error: Option<String>,
    write_error: Option<String>,
    delete_error: Option<String>,
}

impl MockTransport {
    /// Create a mock transport that accepts everything
    pub fn new() -> Self {
        Self::default()
    }

    /// Configure to fail when opening a session
    pub fn with_connect_error(mut self, error: &str) -> Self {
        self.connect_error = Some(error.to_string());
        self
    }

    /// Configure to fail every write
    pub fn with_write_error(mut self, error: &str) -> Self {
        self.write_error = Some(error.to_string());
        self
    }

    /// Configure to fail every delete
    pub fn with_delete_error(mut self, error: &str) -> Self {
        self.delete_error = Some(error.to_string());
        self
    }

    /// Files written so far, oldest first
    pub fn writes(&self) -> Vec<RecordedWrite> {
        self.lock().writes.clone()
    }

    /// Deletes issued so far, oldest first
    pub fn deletes(&self) -> Vec<RecordedDelete> {
        self.lock().deletes.clone()
    }

    /// Number of sessions ever opened
    pub fn sessions_opened(&self) -> usize {
        self.lock().sessions_opened
    }

    /// Number of sessions not yet released
    pub fn sessions_open(&self) -> usize {
        self.lock().sessions_open
    }

    fn lock(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }
}

#[async_trait]
impl Transport for MockTransport {
    fn name(&self) -> &'static str {
        "mock"
    }

    async fn connect(
        &self,
        node: &NodeHandle,
    ) -> Result<Box<dyn TransportSession>, ReconcileError> {
        if let Some(error) = &self.connect_error {
            return Err(ReconcileError::Transport(error.clone()));
        }

        {
            let mut state = self.lock();
            state.sessions_opened += 1;
            state.sessions_open += 1;
        }

        Ok(Box::new(MockSession {
            node: node.name.clone(),
            transport: self.clone(),
        }))
    }
}

struct MockSession {
    node: String,
    transport: MockTransport,
}

impl Drop for MockSession {
    fn drop(&mut self) {
        self.transport.lock().sessions_open -= 1;
    }
}

#[async_trait]
impl TransportSession for MockSession {
    async fn write_file(&mut self, path: &str, content: &[u8]) -> Result<(), ReconcileError> {
        if let Some(error) = &self.transport.write_error {
            return Err(ReconcileError::Transport(error.clone()));
        }

        self.transport.lock().writes.push(RecordedWrite {
            node: self.node.clone(),
            path: path.to_string(),
            content: String::from_utf8_lossy(content).into_owned(),
        });
        Ok(())
    }

    async fn delete_volume(
        &mut self,
        storage: &StorageHandle,
        volume_id: &str,
    ) -> Result<(), ReconcileError> {
        if let Some(error) = &self.transport.delete_error {
            return Err(ReconcileError::Transport(error.clone()));
        }

        self.transport.lock().deletes.push(RecordedDelete {
            node: self.node.clone(),
            storage: storage.name.clone(),
            volume_id: volume_id.to_string(),
        });
        Ok(())
    }
}
