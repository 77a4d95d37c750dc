//! Hive command-line entry point.
//!
//! Binary name: `hive`
//!
//! Parses CLI arguments, resolves configuration, then dispatches to the
//! command handler.

mod cli;
mod state;

use clap::Parser;

use cli::{Cli, Commands};
use state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Set up tracing based on verbosity
    let filter = match cli.verbose {
        0 if cli.quiet => "error",
        0 => "warn",
        1 => "info,hive_core=debug,hive_infra=debug",
        _ => "trace",
    };
    if let Err(e) = hive_observe::init_tracing(filter, cli.otel) {
        eprintln!("Warning: tracing setup failed: {e}");
    }

    let output = cli.output();
    let result = match AppState::from_cli(&cli) {
        Ok(state) => match cli.command {
            Commands::Send { message } => cli::send::send(&state, &message, output).await,
            Commands::Listen { count, props } => {
                cli::listen::listen(&state, count, props, output).await
            }
            Commands::Ping { timeout_ms, first } => {
                cli::ping::ping(&state, timeout_ms, first, output).await
            }
            Commands::Dir => cli::dir::dir(&state, output).await,
        },
        Err(e) => Err(e),
    };

    hive_observe::shutdown_tracing();
    result
}
