//! Configuration loader for Hive.
//!
//! Reads a `hive.toml` file into [`HiveConfig`] and layers `HIVE_*`
//! environment variables on top. Falls back to defaults when the file is
//! missing or malformed.

use std::path::{Path, PathBuf};

use hive_types::config::HiveConfig;
use hive_types::error::HiveError;

pub const ENV_APP_NAME: &str = "HIVE_APP_NAME";
pub const ENV_APP_SOURCE: &str = "HIVE_APP_SOURCE";
pub const ENV_MESSAGE_ROOT: &str = "HIVE_MESSAGE_ROOT";

/// Read and parse a TOML config file, surfacing every failure.
///
/// Used when the caller named the file explicitly and a typo should not
/// silently fall back to defaults.
pub fn try_load_config(path: &Path) -> Result<HiveConfig, HiveError> {
    let content = std::fs::read_to_string(path).map_err(|e| HiveError::io(path, e))?;
    toml::from_str::<HiveConfig>(&content)
        .map_err(|e| HiveError::Config(format!("{}: {e}", path.display())))
}

/// Load configuration from a TOML file.
///
/// - If the file does not exist, returns [`HiveConfig::default()`].
/// - If the file exists but cannot be read or parsed, logs a warning and
///   returns the default.
pub fn load_config(path: &Path) -> HiveConfig {
    match try_load_config(path) {
        Ok(config) => config,
        Err(HiveError::Io { source, .. }) if source.kind() == std::io::ErrorKind::NotFound => {
            tracing::debug!("No config found at {}, using defaults", path.display());
            HiveConfig::default()
        }
        Err(err) => {
            tracing::warn!("Failed to load {}: {err}, using defaults", path.display());
            HiveConfig::default()
        }
    }
}

/// Override file values with non-blank environment values.
///
/// `lookup` resolves a variable name; pass `|k| std::env::var(k).ok()` for the
/// process environment.
pub fn apply_env_overrides<F>(mut config: HiveConfig, lookup: F) -> HiveConfig
where
    F: Fn(&str) -> Option<String>,
{
    let value = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

    if let Some(name) = value(ENV_APP_NAME) {
        config.app_name = Some(name);
    }
    if let Some(source) = value(ENV_APP_SOURCE) {
        config.app_source = Some(source);
    }
    if let Some(root) = value(ENV_MESSAGE_ROOT) {
        config.message_root = Some(PathBuf::from(root));
    }
    config
}

/// [`load_config`] followed by overrides from the process environment.
pub fn load_config_from_env(path: &Path) -> HiveConfig {
    apply_env_overrides(load_config(path), |key| std::env::var(key).ok())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use tempfile::TempDir;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn load_config_missing_file_returns_default() {
        let tmp = TempDir::new().unwrap();
        let config = load_config(&tmp.path().join("hive.toml"));
        assert_eq!(config, HiveConfig::default());
    }

    #[test]
    fn load_config_valid_toml_returns_parsed() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("hive.toml");
        std::fs::write(
            &path,
            r#"
app_name = "editor"
message_root = "/var/tmp/hive"

[timing]
poll_interval_ms = 50
"#,
        )
        .unwrap();

        let config = load_config(&path);
        assert_eq!(config.app_name(), Some("editor"));
        assert_eq!(config.message_root, Some(PathBuf::from("/var/tmp/hive")));
        assert_eq!(config.timing.poll_interval_ms, 50);
        assert_eq!(config.timing.retention_ttl_ms, 30_000);
    }

    #[test]
    fn load_config_invalid_toml_returns_default() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("hive.toml");
        std::fs::write(&path, "this is not { valid toml !!!").unwrap();

        assert_eq!(load_config(&path), HiveConfig::default());
    }

    #[test]
    fn try_load_config_reports_missing_file() {
        let tmp = TempDir::new().unwrap();
        let err = try_load_config(&tmp.path().join("absent.toml")).unwrap_err();
        assert!(matches!(err, HiveError::Io { .. }));
    }

    #[test]
    fn try_load_config_reports_parse_error() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("hive.toml");
        std::fs::write(&path, "app_name = [not a string").unwrap();

        let err = try_load_config(&path).unwrap_err();
        assert!(matches!(err, HiveError::Config(_)));
        assert!(err.to_string().contains("hive.toml"));
    }

    #[test]
    fn env_overrides_file_values() {
        let file = HiveConfig {
            app_name: Some("from-file".to_string()),
            app_source: Some("file-source".to_string()),
            ..HiveConfig::default()
        };
        let config = apply_env_overrides(
            file,
            env(&[(ENV_APP_NAME, "from-env"), (ENV_MESSAGE_ROOT, "/tmp/env-root")]),
        );

        assert_eq!(config.app_name(), Some("from-env"));
        assert_eq!(config.app_source(), Some("file-source"));
        assert_eq!(config.message_root, Some(PathBuf::from("/tmp/env-root")));
    }

    #[test]
    fn blank_env_values_are_ignored() {
        let file = HiveConfig {
            app_name: Some("from-file".to_string()),
            ..HiveConfig::default()
        };
        let config = apply_env_overrides(file, env(&[(ENV_APP_NAME, "  "), (ENV_APP_SOURCE, "")]));

        assert_eq!(config.app_name(), Some("from-file"));
        assert_eq!(config.app_source, None);
    }
}
