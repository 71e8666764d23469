//! Canonical cloud-config rendering
//!
//! Identical documents must always render to identical bytes, so every
//! mapping is emitted with its keys sorted regardless of how it was built.

use serde_yaml::{Mapping, Value};

use super::{CLOUD_CONFIG_HEADER, CloudConfig};
use crate::ReconcileError;

/// Render a cloud-config document as `#cloud-config` YAML
///
/// Field order is `hostname`, `packages`, `runcmd`, then extension keys in
/// lexicographic order. Empty fields are left out, and so is any mapping
/// entry (top-level or nested) whose value is an empty list: a layer that
/// contributes zero items renders the same as one that is absent.
pub fn render_cloud_config(config: &CloudConfig) -> Result<String, ReconcileError> {
    let mut out = String::from(CLOUD_CONFIG_HEADER);
    out.push('\n');

    let canonical: Mapping = config
        .to_mapping()
        .into_iter()
        .filter(|(_, value)| !is_empty_list(value))
        .map(|(key, value)| (key, canonicalize(&value)))
        .collect();

    if canonical.is_empty() {
        return Ok(out);
    }

    out.push_str(&serde_yaml::to_string(&Value::Mapping(canonical))?);
    Ok(out)
}

/// Rebuild a value with every nested mapping in sorted key order
///
/// Empty lists inside sequences are kept, since dropping them would shift
/// the remaining items.
fn canonicalize(value: &Value) -> Value {
    match value {
        Value::Mapping(map) => {
            let mut entries: Vec<(&Value, &Value)> = map
                .iter()
                .filter(|(_, value)| !is_empty_list(value))
                .collect();
            entries.sort_by_key(|(key, _)| sort_key(key));
            let mut sorted = Mapping::with_capacity(entries.len());
            for (key, value) in entries {
                sorted.insert(key.clone(), canonicalize(value));
            }
            Value::Mapping(sorted)
        }
        Value::Sequence(items) => Value::Sequence(items.iter().map(canonicalize).collect()),
        Value::Tagged(tagged) => {
            let mut tagged = tagged.as_ref().clone();
            tagged.value = canonicalize(&tagged.value);
            Value::Tagged(Box::new(tagged))
        }
        other => other.clone(),
    }
}

fn is_empty_list(value: &Value) -> bool {
    matches!(value, Value::Sequence(items) if items.is_empty())
}

/// Keys order by kind first, so `1` and `"1"` never tie
fn sort_key(key: &Value) -> (u8, String) {
    match key {
        Value::Null => (0, String::new()),
        Value::Bool(b) => (1, b.to_string()),
        Value::Number(n) => (2, n.to_string()),
        Value::String(s) => (3, s.clone()),
        Value::Sequence(_) => (4, serde_yaml::to_string(key).unwrap_or_default()),
        Value::Mapping(_) => (5, serde_yaml::to_string(key).unwrap_or_default()),
        Value::Tagged(_) => (6, serde_yaml::to_string(key).unwrap_or_default()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_field_order() {
        let mut config = CloudConfig {
            hostname: "worker-1".into(),
            packages: vec!["qemu-guest-agent".into()],
            runcmd: vec!["systemctl start qemu-guest-agent".into()],
            ..Default::default()
        };
        config.extra.insert("timezone".into(), Value::from("UTC"));
        config.extra.insert("locale".into(), Value::from("en_US.UTF-8"));

        let rendered = render_cloud_config(&config).unwrap();
        assert_eq!(
            rendered,
            "#cloud-config\n\
             hostname: worker-1\n\
             packages:\n\
             - qemu-guest-agent\n\
             runcmd:\n\
             - systemctl start qemu-guest-agent\n\
             locale: en_US.UTF-8\n\
             timezone: UTC\n"
        );
    }

    #[test]
    fn test_render_omits_empty_fields() {
        let config = CloudConfig {
            runcmd: vec!["reboot".into()],
            ..Default::default()
        };
        let rendered = render_cloud_config(&config).unwrap();
        assert!(!rendered.contains("hostname"));
        assert!(!rendered.contains("packages"));
        assert!(rendered.contains("runcmd:"));
    }

    #[test]
    fn test_render_empty_document() {
        let rendered = render_cloud_config(&CloudConfig::default()).unwrap();
        assert_eq!(rendered, "#cloud-config\n");
    }

    #[test]
    fn test_render_sorts_nested_mappings() {
        let a: Value = serde_yaml::from_str("{b: 1, a: {y: 2, x: 3}}").unwrap();
        let b: Value = serde_yaml::from_str("{a: {x: 3, y: 2}, b: 1}").unwrap();

        let mut first = CloudConfig::default();
        first.extra.insert("ntp".into(), a);
        let mut second = CloudConfig::default();
        second.extra.insert("ntp".into(), b);

        let first = render_cloud_config(&first).unwrap();
        let second = render_cloud_config(&second).unwrap();
        assert_eq!(first, second);
        assert!(first.find("x: 3").unwrap() < first.find("y: 2").unwrap());
    }

    #[test]
    fn test_render_drops_empty_extension_lists() {
        let absent = CloudConfig::from_yaml("packages: [nginx]").unwrap();
        let empty = CloudConfig::from_yaml("packages: [nginx]\nwrite_files: []").unwrap();

        let rendered = render_cloud_config(&empty).unwrap();
        assert_eq!(rendered, render_cloud_config(&absent).unwrap());
        assert!(!rendered.contains("write_files"));
    }

    #[test]
    fn test_render_drops_nested_empty_lists() {
        let with_empty = CloudConfig::from_yaml("apt:\n  sources: []\n  proxy: http://p").unwrap();
        let without = CloudConfig::from_yaml("apt:\n  proxy: http://p").unwrap();
        assert_eq!(
            render_cloud_config(&with_empty).unwrap(),
            render_cloud_config(&without).unwrap()
        );
    }

    #[test]
    fn test_render_only_empty_lists_is_bare_header() {
        let config = CloudConfig::from_yaml("write_files: []\nbootcmd: []").unwrap();
        assert_eq!(render_cloud_config(&config).unwrap(), "#cloud-config\n");
    }

    #[test]
    fn test_render_number_and_string_keys_are_ordered_by_kind() {
        let a: Value = serde_yaml::from_str("{'1': s, 1: n}").unwrap();
        let b: Value = serde_yaml::from_str("{1: n, '1': s}").unwrap();
        assert_eq!(a, b);

        let mut first = CloudConfig::default();
        first.extra.insert("ids".into(), a);
        let mut second = CloudConfig::default();
        second.extra.insert("ids".into(), b);

        let first = render_cloud_config(&first).unwrap();
        assert_eq!(first, render_cloud_config(&second).unwrap());
        assert!(first.find("1: n").unwrap() < first.find("'1': s").unwrap());
    }
}
