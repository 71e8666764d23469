//! Snippet locations on a storage backend
//!
//! Everything here is derived from the machine name alone so that a snippet
//! written on one reconcile pass can be found and deleted on a later one.

use std::path::{Component, Path};

use crate::ReconcileError;

/// Directory, relative to a storage root, that holds cloud-init snippets
pub const SNIPPET_DIR: &str = "snippets";

/// Reject machine names that would not stay a single file name below `snippets/`
pub fn validate_machine_name(machine: &str) -> Result<(), ReconcileError> {
    let mut components = Path::new(machine).components();
    let single = matches!(
        (components.next(), components.next()),
        (Some(Component::Normal(_)), None)
    );

    if !single || machine.contains(['/', '\\', '\0']) {
        return Err(ReconcileError::Config(format!(
            "invalid machine name: {:?}",
            machine
        )));
    }
    Ok(())
}

/// snippets/<machine>-user.yml
pub fn user_snippet_path(machine: &str) -> String {
    format!("{}/{}-user.yml", SNIPPET_DIR, machine)
}

/// <storage root>/snippets/<machine>-user.yml - where the file is written on the node
pub fn user_snippet_file(storage_root: &str, machine: &str) -> String {
    format!("{}/{}", storage_root, user_snippet_path(machine))
}

/// <storage>:snippets/<machine>-user.yml - the handle used to delete the snippet
pub fn user_volume_id(storage_name: &str, machine: &str) -> String {
    format!("{}:{}", storage_name, user_snippet_path(machine))
}

/// Split a volume identifier into its storage name and relative path
pub fn parse_volume_id(volume_id: &str) -> Option<(&str, &str)> {
    match volume_id.split_once(':') {
        Some((storage, path)) if !storage.is_empty() && !path.is_empty() => Some((storage, path)),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_user_snippet_path() {
        assert_eq!(user_snippet_path("worker-1"), "snippets/worker-1-user.yml");
    }

    #[test]
    fn test_user_snippet_file() {
        assert_eq!(
            user_snippet_file("/var/lib/vz", "worker-1"),
            "/var/lib/vz/snippets/worker-1-user.yml"
        );
    }

    #[test]
    fn test_user_volume_id() {
        assert_eq!(
            user_volume_id("local", "worker-1"),
            "local:snippets/worker-1-user.yml"
        );
    }

    #[test]
    fn test_parse_volume_id() {
        assert_eq!(
            parse_volume_id("local:snippets/worker-1-user.yml"),
            Some(("local", "snippets/worker-1-user.yml"))
        );
        assert_eq!(parse_volume_id("no-separator"), None);
        assert_eq!(parse_volume_id(":snippets/a"), None);
        assert_eq!(parse_volume_id("local:"), None);
    }

    #[test]
    fn test_volume_id_round_trip() {
        let id = user_volume_id("cephfs", "cp-0");
        let (storage, path) = parse_volume_id(&id).unwrap();
        assert_eq!(storage, "cephfs");
        assert_eq!(path, user_snippet_path("cp-0"));
    }

    #[test]
    fn test_validate_machine_name() {
        assert!(validate_machine_name("worker-1").is_ok());
        assert!(validate_machine_name("cp.example.internal").is_ok());

        for bad in ["", ".", "..", "../../escaped", "a/b", "a/", "/abs", "a\\b", "a\0b"] {
            let err = validate_machine_name(bad).unwrap_err();
            assert!(matches!(err, ReconcileError::Config(_)), "{:?}", bad);
        }
    }
}
