//! Error types for cloud-init-reconciler

use thiserror::Error;

/// Main error type for reconciler operations
#[derive(Error, Debug)]
pub enum ReconcileError {
    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Merge error at '{path}': {message}")]
    Merge { path: String, message: String },

    #[error("Lookup error: {0}")]
    Lookup(String),

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("failed to write file: {0}")]
    WriteFile(#[source] Box<ReconcileError>),

    #[error("failed to delete volume '{volume_id}': {source}")]
    DeleteVolume {
        volume_id: String,
        #[source]
        source: Box<ReconcileError>,
    },

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

impl ReconcileError {
    /// Create a merge error for the given key path
    pub fn merge(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Merge {
            path: path.into(),
            message: message.into(),
        }
    }

    /// Wrap a transport failure that happened while writing the snippet
    pub fn write_file(source: ReconcileError) -> Self {
        Self::WriteFile(Box::new(source))
    }

    /// Wrap a transport failure that happened while deleting a volume
    pub fn delete_volume(volume_id: impl Into<String>, source: ReconcileError) -> Self {
        Self::DeleteVolume {
            volume_id: volume_id.into(),
            source: Box::new(source),
        }
    }
}
