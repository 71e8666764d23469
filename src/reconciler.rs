//! User-data snippet reconciliation
//!
//! Each pass rebuilds the machine's user-data from scratch:
//! computed default -> operator override -> bootstrap data, renders it and
//! writes it to the storage backend. Nothing is cached between passes, so a
//! failed pass can simply be run again.

use std::sync::Arc;

use tracing::{debug, info};

use crate::backend::{NodeLookup, Transport};
use crate::config::{CloudConfig, merge::merge_configs};
use crate::settings::{DefaultUserData, Settings};
use crate::{ReconcileError, paths};

/// Build the final user-data document for `machine`
///
/// The operator layer is optional; leaving it out gives the same result as
/// passing an empty document.
pub fn build_user_data(
    defaults: &DefaultUserData,
    machine: &str,
    operator: Option<&CloudConfig>,
    bootstrap: &str,
) -> Result<CloudConfig, ReconcileError> {
    let bootstrap = CloudConfig::from_yaml(bootstrap)?;

    let mut base = defaults.for_machine(machine);
    if let Some(operator) = operator {
        debug!("Merging operator override for {}", machine);
        base = merge_configs(&base, operator)?;
    }

    debug!("Merging bootstrap data for {}", machine);
    merge_configs(&base, &bootstrap)
}

/// Build and render the final user-data document for `machine`
pub fn render_user_data(
    defaults: &DefaultUserData,
    machine: &str,
    operator: Option<&CloudConfig>,
    bootstrap: &str,
) -> Result<String, ReconcileError> {
    build_user_data(defaults, machine, operator, bootstrap)?.to_yaml()
}

/// Writes and removes user-data snippets for machines on one node/storage pair
pub struct Reconciler {
    node: String,
    storage: String,
    defaults: DefaultUserData,
    lookup: Arc<dyn NodeLookup>,
    transport: Arc<dyn Transport>,
}

impl Reconciler {
    /// Create a reconciler with the baseline computed default
    pub fn new(
        node: impl Into<String>,
        storage: impl Into<String>,
        lookup: Arc<dyn NodeLookup>,
        transport: Arc<dyn Transport>,
    ) -> Self {
        Self {
            node: node.into(),
            storage: storage.into(),
            defaults: DefaultUserData::default(),
            lookup,
            transport,
        }
    }

    /// Create a reconciler for the node, storage and defaults in `settings`
    pub fn from_settings(
        settings: &Settings,
        lookup: Arc<dyn NodeLookup>,
        transport: Arc<dyn Transport>,
    ) -> Self {
        Self::new(&settings.node, &settings.storage.name, lookup, transport)
            .with_defaults(settings.defaults.clone())
    }

    /// Use a custom computed default
    pub fn with_defaults(mut self, defaults: DefaultUserData) -> Self {
        self.defaults = defaults;
        self
    }

    /// Render the user-data for `machine` without writing it
    pub fn render_user(
        &self,
        machine: &str,
        operator: Option<&CloudConfig>,
        bootstrap: &str,
    ) -> Result<String, ReconcileError> {
        render_user_data(&self.defaults, machine, operator, bootstrap)
    }

    /// Render the user-data for `machine` and write it to the storage backend
    ///
    /// Invalid machine names, parse errors and merge errors abort before
    /// anything touches the node. A failed write is reported as
    /// [`ReconcileError::WriteFile`].
    pub async fn reconcile_user(
        &self,
        machine: &str,
        operator: Option<&CloudConfig>,
        bootstrap: &str,
    ) -> Result<(), ReconcileError> {
        paths::validate_machine_name(machine)?;

        let user_data = self.render_user(machine, operator, bootstrap)?;
        info!("User-data for {}:\n{}", machine, user_data);

        let node = self.lookup.node(&self.node).await?;
        let storage = self.lookup.storage(&self.storage).await?;
        let file_path = paths::user_snippet_file(&storage.path, machine);

        let mut session = self.transport.connect(&node).await?;
        session
            .write_file(&file_path, user_data.as_bytes())
            .await
            .map_err(ReconcileError::write_file)?;

        info!(
            "Wrote user-data for {} to {} via {}",
            machine,
            file_path,
            self.transport.name()
        );
        Ok(())
    }

    /// Delete the user-data snippet for `machine`
    ///
    /// The volume identifier is derived from the machine name alone. Deleting
    /// a snippet that is already gone fails however the transport says it does.
    pub async fn delete_config(&self, machine: &str) -> Result<(), ReconcileError> {
        paths::validate_machine_name(machine)?;

        let volume_id = paths::user_volume_id(&self.storage, machine);

        let node = self.lookup.node(&self.node).await?;
        let mut storage = self.lookup.storage(&self.storage).await?;
        storage.bind(&node);

        let mut session = self.transport.connect(&node).await?;
        session
            .delete_volume(&storage, &volume_id)
            .await
            .map_err(|e| ReconcileError::delete_volume(&volume_id, e))?;

        info!("Deleted user-data volume {}", volume_id);
        Ok(())
    }
}
