//! Configuration types for the Hive bus.
//!
//! `HiveConfig` is the top-level `hive.toml` that names the application whose
//! instances talk to each other and tunes the filesystem transport.

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Top-level configuration for a Hive installation.
///
/// All fields have sensible defaults; an empty file is a valid config.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HiveConfig {
    /// Application name used to derive the shared message directory.
    #[serde(default)]
    pub app_name: Option<String>,

    /// Distribution source of the application (e.g. a download URL). Keeps
    /// same-named applications from different sources apart.
    #[serde(default)]
    pub app_source: Option<String>,

    /// Root directory for per-application message directories.
    /// Defaults to `~/.hive/messages` when unset.
    #[serde(default)]
    pub message_root: Option<PathBuf>,

    /// Transport timing parameters.
    #[serde(default)]
    pub timing: TimingConfig,
}

/// Timing parameters of the filesystem transport, in milliseconds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimingConfig {
    /// How long the watch loop blocks waiting for directory events.
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,

    /// Delay between a creation event and reading the file.
    #[serde(default = "default_settle_delay_ms")]
    pub settle_delay_ms: u64,

    /// Age after which message files are deleted.
    #[serde(default = "default_retention_ttl_ms")]
    pub retention_ttl_ms: u64,

    /// Interval between cleanup sweeps.
    #[serde(default = "default_cleanup_interval_ms")]
    pub cleanup_interval_ms: u64,
}

fn default_poll_interval_ms() -> u64 {
    100
}

fn default_settle_delay_ms() -> u64 {
    20
}

fn default_retention_ttl_ms() -> u64 {
    30_000
}

fn default_cleanup_interval_ms() -> u64 {
    10_000
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: default_poll_interval_ms(),
            settle_delay_ms: default_settle_delay_ms(),
            retention_ttl_ms: default_retention_ttl_ms(),
            cleanup_interval_ms: default_cleanup_interval_ms(),
        }
    }
}

impl TimingConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn settle_delay(&self) -> Duration {
        Duration::from_millis(self.settle_delay_ms)
    }

    pub fn retention_ttl(&self) -> Duration {
        Duration::from_millis(self.retention_ttl_ms)
    }

    pub fn cleanup_interval(&self) -> Duration {
        Duration::from_millis(self.cleanup_interval_ms)
    }
}

impl HiveConfig {
    /// The application name, if present and not blank.
    pub fn app_name(&self) -> Option<&str> {
        non_blank(self.app_name.as_deref())
    }

    /// The application source, if present and not blank.
    pub fn app_source(&self) -> Option<&str> {
        non_blank(self.app_source.as_deref())
    }
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.filter(|v| !v.trim().is_empty())
}
