//! Message directory naming.
//!
//! Every application gets its own directory under the message root, so
//! unrelated applications never see each other's traffic. When a distribution
//! source is known its SHA-256 prefixes the name, which keeps same-named
//! applications from different sources apart as well.

use std::path::PathBuf;

use hive_types::config::HiveConfig;
use sha2::{Digest, Sha256};

/// Directory name for an application: `{sha256(source)}.{name}` or `{name}`.
///
/// The name is sanitized; a blank source counts as absent.
pub fn app_dir_name(name: &str, source: Option<&str>) -> String {
    let name = sanitize(name);
    match source.filter(|s| !s.trim().is_empty()) {
        Some(source) => format!("{:x}.{name}", Sha256::digest(source.as_bytes())),
        None => name,
    }
}

/// Replace every character outside `[A-Za-z0-9._-]` with `_`.
pub fn sanitize(name: &str) -> String {
    name.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-') {
                c
            } else {
                '_'
            }
        })
        .collect()
}

/// Root under which per-application directories live.
///
/// Uses the configured root, otherwise `~/.hive/messages`, otherwise
/// `./.hive/messages` when no home directory is known.
pub fn resolve_message_root(config: &HiveConfig) -> PathBuf {
    if let Some(root) = &config.message_root {
        return root.clone();
    }
    match dirs::home_dir() {
        Some(home) => home.join(".hive").join("messages"),
        None => PathBuf::from(".hive").join("messages"),
    }
}

/// Full message directory for the configured application, if it is named.
pub fn resolve_message_dir(config: &HiveConfig) -> Option<PathBuf> {
    let name = config.app_name()?;
    Some(resolve_message_root(config).join(app_dir_name(name, config.app_source())))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sanitize_keeps_safe_characters() {
        assert_eq!(sanitize("My-App_1.0"), "My-App_1.0");
    }

    #[test]
    fn sanitize_replaces_everything_else() {
        assert_eq!(sanitize("my app/v2:beta"), "my_app_v2_beta");
        assert_eq!(sanitize("caf\u{e9}"), "caf_");
    }

    #[test]
    fn name_without_source() {
        assert_eq!(app_dir_name("my app", None), "my_app");
    }

    #[test]
    fn blank_source_counts_as_absent() {
        assert_eq!(app_dir_name("app", Some("")), "app");
        assert_eq!(app_dir_name("app", Some("   ")), "app");
    }

    #[test]
    fn source_hash_prefixes_name() {
        // SHA-256 of "abc"
        assert_eq!(
            app_dir_name("app", Some("abc")),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad.app"
        );
    }

    #[test]
    fn different_sources_are_isolated() {
        let a = app_dir_name("app", Some("https://a.example/app.jar"));
        let b = app_dir_name("app", Some("https://b.example/app.jar"));
        assert_ne!(a, b);
        assert!(a.ends_with(".app"));
    }

    #[test]
    fn configured_root_wins() {
        let config = HiveConfig {
            message_root: Some(PathBuf::from("/tmp/hive-root")),
            ..HiveConfig::default()
        };
        assert_eq!(resolve_message_root(&config), PathBuf::from("/tmp/hive-root"));
    }

    #[test]
    fn default_root_ends_with_hive_messages() {
        let root = resolve_message_root(&HiveConfig::default());
        assert!(root.ends_with(".hive/messages"));
    }

    #[test]
    fn message_dir_requires_app_name() {
        let mut config = HiveConfig {
            message_root: Some(PathBuf::from("/tmp/hive-root")),
            ..HiveConfig::default()
        };
        assert_eq!(resolve_message_dir(&config), None);

        config.app_name = Some("demo".to_string());
        assert_eq!(
            resolve_message_dir(&config),
            Some(PathBuf::from("/tmp/hive-root/demo"))
        );
    }
}
