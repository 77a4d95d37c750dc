use std::path::PathBuf;

use thiserror::Error;

/// Errors surfaced to callers that set up a bus or a transport driver.
///
/// Runtime failures on background threads never produce these; they are
/// logged and swallowed where they happen.
#[derive(Debug, Error)]
pub enum HiveError {
    #[error("application name is missing or blank")]
    MissingAppName,

    #[error("i/o error at '{}': {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("watch registration failed: {0}")]
    Watch(String),

    #[error("invalid configuration: {0}")]
    Config(String),
}

impl HiveError {
    /// Wrap an I/O error together with the path it concerns.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}
