//! CLI command definitions for the `hive` binary.
//!
//! Uses clap derive macros for argument parsing. Global options select the
//! application (and therefore the message directory); subcommands act on it.

pub mod dir;
pub mod listen;
pub mod ping;
pub mod send;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// Talk to the other running instances of an application.
#[derive(Parser)]
#[command(name = "hive", version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Application name (selects the shared message directory).
    #[arg(long, global = true)]
    pub app: Option<String>,

    /// Distribution source of the application, e.g. its download URL.
    #[arg(long, global = true)]
    pub source: Option<String>,

    /// Root directory holding per-application message directories.
    #[arg(long, global = true)]
    pub root: Option<PathBuf>,

    /// Path to a hive.toml configuration file.
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Output machine-readable JSON instead of styled text.
    #[arg(long, global = true)]
    pub json: bool,

    /// Suppress all output except errors. `--json` output is still printed.
    #[arg(long, global = true)]
    pub quiet: bool,

    /// Detailed output (-v for verbose, -vv for debug/trace).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Export spans to stdout through OpenTelemetry. The exporter shares
    /// stdout with command output, so it cannot be combined with `--json`.
    #[arg(long, global = true, conflicts_with = "json")]
    pub otel: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Broadcast one message to every other instance.
    Send {
        /// Message text.
        message: String,
    },

    /// Print messages from other instances until interrupted.
    Listen {
        /// Exit after this many messages.
        #[arg(long)]
        count: Option<usize>,

        /// Advertise a property in ping responses (repeatable).
        #[arg(long = "prop", value_name = "KEY=VALUE", value_parser = parse_property)]
        props: Vec<(String, String)>,
    },

    /// Discover running instances.
    Ping {
        /// How long to wait for responses.
        #[arg(long, default_value_t = 2000)]
        timeout_ms: u64,

        /// Stop at the first response.
        #[arg(long)]
        first: bool,
    },

    /// Show the resolved message directory.
    Dir,
}

/// How command handlers report results.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Output {
    Human,
    Json,
    Quiet,
}

impl Cli {
    pub fn output(&self) -> Output {
        if self.json {
            Output::Json
        } else if self.quiet {
            Output::Quiet
        } else {
            Output::Human
        }
    }
}

/// Parse `key=value`; the value may itself contain `=`.
fn parse_property(raw: &str) -> Result<(String, String), String> {
    raw.split_once('=')
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .ok_or_else(|| format!("expected KEY=VALUE, got '{raw}'"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn parse_property_splits_on_first_equals() {
        assert_eq!(
            parse_property("url=http://x/?a=b"),
            Ok(("url".to_string(), "http://x/?a=b".to_string()))
        );
        assert!(parse_property("novalue").is_err());
    }

    #[test]
    fn global_flags_after_subcommand() {
        let cli = Cli::parse_from(["hive", "ping", "--first", "--app", "editor", "--json"]);
        assert_eq!(cli.app.as_deref(), Some("editor"));
        assert!(cli.json);
        assert!(matches!(
            cli.command,
            Commands::Ping {
                timeout_ms: 2000,
                first: true
            }
        ));
    }

    #[test]
    fn output_mode_follows_flags() {
        assert_eq!(Cli::parse_from(["hive", "dir"]).output(), Output::Human);
        assert_eq!(Cli::parse_from(["hive", "dir", "--quiet"]).output(), Output::Quiet);
        assert_eq!(
            Cli::parse_from(["hive", "dir", "--quiet", "--json"]).output(),
            Output::Json
        );
    }

    #[test]
    fn otel_conflicts_with_json() {
        assert!(Cli::try_parse_from(["hive", "ping", "--json", "--otel"]).is_err());
        assert!(Cli::try_parse_from(["hive", "ping", "--otel"]).is_ok());
    }

    #[test]
    fn listen_collects_properties() {
        let cli = Cli::parse_from([
            "hive", "listen", "--prop", "role=a", "--prop", "zone=eu", "--count", "3",
        ]);
        match cli.command {
            Commands::Listen { count, props } => {
                assert_eq!(count, Some(3));
                assert_eq!(props.len(), 2);
                assert_eq!(props[1], ("zone".to_string(), "eu".to_string()));
            }
            _ => panic!("expected listen"),
        }
    }
}
