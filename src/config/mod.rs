//! Cloud-config user-data model
//!
//! Handles parsing of the cloud-config YAML documents that are layered
//! together into a machine's user-data snippet.

pub mod merge;
pub mod render;

use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_yaml::{Mapping, Value};
use std::collections::BTreeMap;

use crate::ReconcileError;

/// Marker line that opens every cloud-config document
pub const CLOUD_CONFIG_HEADER: &str = "#cloud-config";

/// One layer of cloud-config user-data, or the result of merging layers
///
/// Keys other than `hostname`, `packages` and `runcmd` are kept verbatim in
/// [`CloudConfig::extra`] so that fields emitted by newer bootstrap providers
/// survive a merge untouched, tags included.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CloudConfig {
    /// Hostname to set (empty means unset)
    pub hostname: String,

    /// Packages to install
    pub packages: Vec<String>,

    /// Commands to run on first boot, in order
    pub runcmd: Vec<String>,

    /// Any other top-level cloud-config key
    pub extra: BTreeMap<String, Value>,
}

impl CloudConfig {
    /// Parse cloud-config from YAML string
    ///
    /// The `#cloud-config` header is optional. Blank input yields an empty
    /// document; anything that is not a YAML mapping is rejected.
    pub fn from_yaml(yaml: &str) -> Result<Self, ReconcileError> {
        let body = yaml
            .trim_start()
            .strip_prefix(CLOUD_CONFIG_HEADER)
            .unwrap_or(yaml);

        if is_blank(body) {
            return Ok(Self::default());
        }

        let value: Value = serde_yaml::from_str(body)
            .map_err(|e| ReconcileError::Parse(format!("invalid YAML: {}", e)))?;
        Self::from_value(value)
    }

    /// Build a document from an already parsed YAML value
    pub fn from_value(value: Value) -> Result<Self, ReconcileError> {
        match value {
            Value::Null => Ok(Self::default()),
            Value::Mapping(map) => Self::from_mapping(map),
            other => Err(ReconcileError::Parse(format!(
                "expected a mapping at the top level, found {}",
                value_kind(&other)
            ))),
        }
    }

    fn from_mapping(map: Mapping) -> Result<Self, ReconcileError> {
        let mut config = Self::default();

        for (key, value) in map {
            let key = scalar_text(&key).ok_or_else(|| {
                ReconcileError::Parse(format!(
                    "top-level keys must be scalars, found {}",
                    value_kind(&key)
                ))
            })?;

            match key.as_str() {
                "hostname" => config.hostname = string_field("hostname", &value)?,
                "packages" => config.packages = string_list("packages", &value)?,
                "runcmd" => config.runcmd = string_list("runcmd", &value)?,
                _ => {
                    config.extra.insert(key, value);
                }
            }
        }

        Ok(config)
    }

    /// The document as a YAML mapping, empty fields left out
    pub fn to_mapping(&self) -> Mapping {
        let mut map = Mapping::new();
        if !self.hostname.is_empty() {
            map.insert("hostname".into(), self.hostname.as_str().into());
        }
        if !self.packages.is_empty() {
            map.insert("packages".into(), string_seq(&self.packages));
        }
        if !self.runcmd.is_empty() {
            map.insert("runcmd".into(), string_seq(&self.runcmd));
        }
        for (key, value) in &self.extra {
            map.insert(key.as_str().into(), value.clone());
        }
        map
    }

    /// Check if this looks like a cloud-config (starts with #cloud-config)
    pub fn is_cloud_config(data: &str) -> bool {
        data.trim_start().starts_with(CLOUD_CONFIG_HEADER)
    }

    /// Render this document in canonical form
    pub fn to_yaml(&self) -> Result<String, ReconcileError> {
        render::render_cloud_config(self)
    }

    /// True when no layer has contributed anything
    pub fn is_empty(&self) -> bool {
        self.hostname.is_empty()
            && self.packages.is_empty()
            && self.runcmd.is_empty()
            && self.extra.is_empty()
    }
}

impl Serialize for CloudConfig {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_mapping().serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for CloudConfig {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = Value::deserialize(deserializer)?;
        Self::from_value(value).map_err(D::Error::custom)
    }
}

/// Scalars are read as their string form, the way cloud-init itself does
fn scalar_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

/// `hostname:` with no value is as good as leaving the key out
fn string_field(field: &str, value: &Value) -> Result<String, ReconcileError> {
    if value.is_null() {
        return Ok(String::new());
    }
    scalar_text(value).ok_or_else(|| {
        ReconcileError::Parse(format!(
            "{}: expected a string, found {}",
            field,
            value_kind(value)
        ))
    })
}

fn string_list(field: &str, value: &Value) -> Result<Vec<String>, ReconcileError> {
    match value {
        Value::Null => Ok(Vec::new()),
        Value::Sequence(items) => items
            .iter()
            .enumerate()
            .map(|(i, item)| {
                scalar_text(item).ok_or_else(|| {
                    ReconcileError::Parse(format!(
                        "{}[{}]: expected a string, found {}",
                        field,
                        i,
                        value_kind(item)
                    ))
                })
            })
            .collect(),
        other => Err(ReconcileError::Parse(format!(
            "{}: expected a list, found {}",
            field,
            value_kind(other)
        ))),
    }
}

fn string_seq(items: &[String]) -> Value {
    Value::Sequence(items.iter().map(|s| s.as_str().into()).collect())
}

fn is_blank(body: &str) -> bool {
    body.lines().all(|line| {
        let line = line.trim();
        line.is_empty() || line.starts_with('#')
    })
}

/// Short human name for a YAML value's shape, used in error messages
pub(crate) fn value_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Sequence(_) => "list",
        Value::Mapping(_) => "mapping",
        Value::Tagged(_) => "tagged value",
    }
}
