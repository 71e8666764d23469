//! cloud-init-reconciler library
//!
//! Builds a machine's cloud-init user-data from three layers and keeps the
//! rendered snippet on a storage backend in sync with it.
//!
//! # Layers
//!
//! - **Computed default**: hostname plus baseline packages and commands
//! - **Operator override**: optional, declared alongside the machine
//! - **Bootstrap data**: emitted by the cluster bootstrap provider, wins over both
//!
//! Layers are merged pairwise with [`config::merge::merge_configs`] and
//! rendered by [`config::CloudConfig::to_yaml`], which always produces the
//! same bytes for the same document.

pub mod backend;
pub mod config;
pub mod paths;
pub mod reconciler;
pub mod settings;

mod error;

pub use config::CloudConfig;
pub use error::ReconcileError;
pub use reconciler::Reconciler;
