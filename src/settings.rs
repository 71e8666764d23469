//! Reconciler settings
//!
//! Loaded from a YAML file naming the target node and storage, the computed
//! default user-data, and an optional operator override layer.

use serde::{Deserialize, Serialize};
use std::path::Path;
use tokio::fs;
use tracing::debug;

use crate::{ReconcileError, config::CloudConfig};

/// Package installed on every machine unless the defaults say otherwise
pub const DEFAULT_PACKAGE: &str = "qemu-guest-agent";

/// Command run on every machine unless the defaults say otherwise
pub const DEFAULT_RUNCMD: &str = "systemctl start qemu-guest-agent";

/// Top-level settings file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Settings {
    /// Node the snippet is written on
    pub node: String,

    /// Storage backend holding the snippet
    pub storage: StorageSettings,

    /// Baseline for the computed default layer
    #[serde(default)]
    pub defaults: DefaultUserData,

    /// Operator override layer
    #[serde(default)]
    pub user: Option<CloudConfig>,
}

/// Storage backend settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StorageSettings {
    pub name: String,
    pub path: String,
}

/// Packages and commands baked into every machine's computed default
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DefaultUserData {
    pub packages: Vec<String>,
    pub runcmd: Vec<String>,
}

impl Default for DefaultUserData {
    fn default() -> Self {
        Self {
            packages: vec![DEFAULT_PACKAGE.to_string()],
            runcmd: vec![DEFAULT_RUNCMD.to_string()],
        }
    }
}

impl DefaultUserData {
    /// Computed default layer for `machine`
    pub fn for_machine(&self, machine: &str) -> CloudConfig {
        CloudConfig {
            hostname: machine.to_string(),
            packages: self.packages.clone(),
            runcmd: self.runcmd.clone(),
            ..Default::default()
        }
    }
}

impl Settings {
    /// Parse and validate settings from YAML
    pub fn from_yaml(yaml: &str) -> Result<Self, ReconcileError> {
        let settings: Settings = serde_yaml::from_str(yaml)
            .map_err(|e| ReconcileError::Config(format!("invalid settings: {}", e)))?;
        settings.validate()?;
        Ok(settings)
    }

    /// Load settings from a file
    pub async fn load(path: impl AsRef<Path>) -> Result<Self, ReconcileError> {
        let path = path.as_ref();
        debug!("Loading settings from {}", path.display());

        let content = fs::read_to_string(path).await.map_err(|e| {
            ReconcileError::Config(format!("failed to read {}: {}", path.display(), e))
        })?;
        Self::from_yaml(&content)
    }

    fn validate(&self) -> Result<(), ReconcileError> {
        if self.node.trim().is_empty() {
            return Err(ReconcileError::Config("node must not be empty".into()));
        }
        if self.storage.name.trim().is_empty() {
            return Err(ReconcileError::Config(
                "storage.name must not be empty".into(),
            ));
        }
        if self.storage.path.trim().is_empty() {
            return Err(ReconcileError::Config(
                "storage.path must not be empty".into(),
            ));
        }
        Ok(())
    }
}
