//! Cloud-config merging
//!
//! Layers are merged pairwise, lowest precedence first:
//! 1. Computed default (derived from the machine name)
//! 2. Operator override (optional)
//! 3. Bootstrap provider user-data (highest priority)
//!
//! Callers chain two calls, `merge_configs(&merge_configs(&default, &operator)?, &bootstrap)?`,
//! so an absent operator layer behaves exactly like an empty one.

use std::collections::HashSet;

use super::{CloudConfig, value_kind};
use crate::ReconcileError;
use serde_yaml::Value;
use tracing::debug;

/// Merge two CloudConfig instances into a new one
///
/// `high` takes precedence over `low`:
/// - `hostname`: a non-empty `high` value replaces `low`
/// - `packages`: concatenated, duplicates dropped, first-seen order kept
/// - `runcmd`: concatenated as-is (commands are never deduplicated)
/// - extension keys: see [`merge_yaml_values`]
pub fn merge_configs(low: &CloudConfig, high: &CloudConfig) -> Result<CloudConfig, ReconcileError> {
    let hostname = if high.hostname.is_empty() {
        low.hostname.clone()
    } else {
        high.hostname.clone()
    };

    let packages = merge_packages(&low.packages, &high.packages);

    let runcmd = low.runcmd.iter().chain(&high.runcmd).cloned().collect();

    let mut extra = low.extra.clone();
    for (key, high_value) in &high.extra {
        let merged = match extra.get(key) {
            Some(low_value) => merge_yaml_values(key, low_value, high_value)?,
            None => high_value.clone(),
        };
        extra.insert(key.clone(), merged);
    }

    debug!(
        packages = ?packages,
        extra_keys = extra.len(),
        "Merged cloud-config layer"
    );

    Ok(CloudConfig {
        hostname,
        packages,
        runcmd,
        extra,
    })
}

fn merge_packages(low: &[String], high: &[String]) -> Vec<String> {
    let mut seen = HashSet::new();
    low.iter()
        .chain(high)
        .filter(|pkg| seen.insert(pkg.as_str()))
        .cloned()
        .collect()
}

/// Merge two YAML values found under the same key path
///
/// - `null` on either side contributes nothing
/// - mappings merge recursively
/// - lists are appended (`low` then `high`)
/// - scalars: `high` wins
///
/// Any other pairing (e.g. a list in one layer and a string in the other) is
/// an authoring mistake and fails with [`ReconcileError::Merge`].
pub fn merge_yaml_values(path: &str, low: &Value, high: &Value) -> Result<Value, ReconcileError> {
    match (low, high) {
        (low, Value::Null) => Ok(low.clone()),
        (Value::Null, high) => Ok(high.clone()),

        (Value::Mapping(low_map), Value::Mapping(high_map)) => {
            let mut result = low_map.clone();
            for (key, high_value) in high_map {
                let merged = match result.get(key) {
                    Some(low_value) => {
                        merge_yaml_values(&child_path(path, key), low_value, high_value)?
                    }
                    None => high_value.clone(),
                };
                result.insert(key.clone(), merged);
            }
            Ok(Value::Mapping(result))
        }

        (Value::Sequence(low_seq), Value::Sequence(high_seq)) => {
            let mut result = low_seq.clone();
            result.extend(high_seq.iter().cloned());
            Ok(Value::Sequence(result))
        }

        (low, high) if is_scalar(low) && is_scalar(high) => Ok(high.clone()),
        (Value::Tagged(_), Value::Tagged(_)) => Ok(high.clone()),

        (low, high) => Err(ReconcileError::merge(
            path,
            format!(
                "cannot merge {} with {}",
                value_kind(low),
                value_kind(high)
            ),
        )),
    }
}

fn is_scalar(value: &Value) -> bool {
    matches!(value, Value::Bool(_) | Value::Number(_) | Value::String(_))
}

fn child_path(parent: &str, key: &Value) -> String {
    match key {
        Value::String(s) => format!("{}.{}", parent, s),
        Value::Number(n) => format!("{}.{}", parent, n),
        Value::Bool(b) => format!("{}.{}", parent, b),
        _ => format!("{}.?", parent),
    }
}
