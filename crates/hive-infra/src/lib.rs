//! Infrastructure adapters for Hive.
//!
//! Holds the filesystem transport, the message-directory naming rules and the
//! configuration loader. `hive-core` defines the `HiveDriver` port; this crate
//! implements it on top of a watched directory.

pub mod config;
pub mod dir;
pub mod filewatcher;

use std::sync::Arc;

use hive_core::Hive;
use hive_types::config::HiveConfig;
use hive_types::error::HiveError;

pub use filewatcher::FileWatcherDriver;

/// Build a filesystem driver for the configured application and install it.
///
/// Returns the installed driver so callers can inspect its directory.
pub fn install(hive: &Hive, config: &HiveConfig) -> Result<Arc<FileWatcherDriver>, HiveError> {
    let driver = Arc::new(FileWatcherDriver::for_app(config)?);
    hive.set_driver(Some(driver.clone()));
    Ok(driver)
}
