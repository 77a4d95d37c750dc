//! Resolved configuration and bus wiring shared by all commands.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use hive_core::Hive;
use hive_infra::FileWatcherDriver;
use hive_infra::config::{apply_env_overrides, try_load_config};
use hive_infra::dir::resolve_message_dir;
use hive_types::config::HiveConfig;

use crate::cli::Cli;

/// Configuration after layering file, environment and command-line flags.
pub struct AppState {
    pub config: HiveConfig,
}

/// A bus with the filesystem driver installed.
pub struct Connection {
    pub hive: Hive,
    pub driver: Arc<FileWatcherDriver>,
}

impl AppState {
    /// Resolve configuration: `--config` file, then `HIVE_*` variables, then
    /// explicit flags.
    ///
    /// A `--config` file that is missing or malformed is an error.
    pub fn from_cli(cli: &Cli) -> anyhow::Result<Self> {
        let file = match cli.config.as_deref() {
            Some(path) => try_load_config(path)
                .with_context(|| format!("loading --config {}", path.display()))?,
            None => HiveConfig::default(),
        };
        let mut config = apply_env_overrides(file, |key| std::env::var(key).ok());

        if let Some(app) = &cli.app {
            config.app_name = Some(app.clone());
        }
        if let Some(source) = &cli.source {
            config.app_source = Some(source.clone());
        }
        if let Some(root) = &cli.root {
            config.message_root = Some(root.clone());
        }
        Ok(Self { config })
    }

    pub fn message_dir(&self) -> anyhow::Result<PathBuf> {
        resolve_message_dir(&self.config)
            .context("no application name; pass --app or set HIVE_APP_NAME")
    }

    /// Build a bus with a filesystem driver for the configured application.
    pub fn connect(&self) -> anyhow::Result<Connection> {
        let hive = Hive::new();
        let driver = hive_infra::install(&hive, &self.config)
            .context("no application name; pass --app or set HIVE_APP_NAME")?;
        if !hive.is_enabled() {
            anyhow::bail!(
                "message directory {} is not usable",
                driver.message_dir().display()
            );
        }
        tracing::debug!(dir = %driver.message_dir().display(), "connected to message directory");
        Ok(Connection { hive, driver })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;
    use hive_types::error::HiveError;
    use tempfile::TempDir;

    #[test]
    fn flags_override_everything() {
        let cli = Cli::parse_from([
            "hive", "--app", "cli-app", "--root", "/tmp/cli-root", "--source", "src", "dir",
        ]);
        let state = AppState::from_cli(&cli).unwrap();
        assert_eq!(state.config.app_name(), Some("cli-app"));
        assert_eq!(state.config.app_source(), Some("src"));
        assert_eq!(state.config.message_root, Some(PathBuf::from("/tmp/cli-root")));
    }

    #[test]
    fn explicit_config_file_is_applied_under_flags() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("hive.toml");
        std::fs::write(
            &path,
            "app_name = \"from-file\"\n\n[timing]\npoll_interval_ms = 40\n",
        )
        .unwrap();

        let cli = Cli::parse_from([
            "hive",
            "--config",
            path.to_str().unwrap(),
            "--app",
            "flag",
            "dir",
        ]);
        let state = AppState::from_cli(&cli).unwrap();
        assert_eq!(state.config.app_name(), Some("flag"));
        assert_eq!(state.config.timing.poll_interval_ms, 40);
    }

    #[test]
    fn missing_config_file_is_an_error() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("absent.toml");
        let cli = Cli::parse_from(["hive", "--config", path.to_str().unwrap(), "dir"]);

        let err = AppState::from_cli(&cli).err().unwrap();
        assert!(err.to_string().contains("absent.toml"));
        assert!(matches!(
            err.downcast_ref::<HiveError>(),
            Some(HiveError::Io { .. })
        ));
    }

    #[test]
    fn malformed_config_file_is_an_error() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("hive.toml");
        std::fs::write(&path, "app_name = [oops").unwrap();
        let cli = Cli::parse_from(["hive", "--config", path.to_str().unwrap(), "dir"]);

        let err = AppState::from_cli(&cli).err().unwrap();
        assert!(matches!(
            err.downcast_ref::<HiveError>(),
            Some(HiveError::Config(_))
        ));
    }
}
