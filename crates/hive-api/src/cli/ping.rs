//! `hive ping` -- discover running instances.

use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};

use anyhow::Result;
use console::style;
use hive_types::pong::{PingControl, Pong};

use crate::cli::Output;
use crate::state::AppState;

pub async fn ping(state: &AppState, timeout_ms: u64, first: bool, output: Output) -> Result<()> {
    let conn = state.connect()?;
    let hive = conn.hive.clone();
    let timeout = Duration::from_millis(timeout_ms);

    // The round blocks its thread for up to `timeout`.
    let (pongs, elapsed) = tokio::task::spawn_blocking(move || {
        let found: Arc<Mutex<Vec<Pong>>> = Arc::default();
        let sink = Arc::clone(&found);
        let start = Instant::now();
        hive.ping_with(timeout, move |pong| {
            sink.lock()
                .unwrap_or_else(PoisonError::into_inner)
                .push(pong.clone());
            if first {
                PingControl::Stop
            } else {
                PingControl::Continue
            }
        });
        let pongs = std::mem::take(&mut *found.lock().unwrap_or_else(PoisonError::into_inner));
        (pongs, start.elapsed())
    })
    .await?;
    conn.hive.shutdown();

    if output == Output::Quiet {
        return Ok(());
    }
    if output == Output::Json {
        let out = serde_json::json!({
            "responders": pongs,
            "elapsed_ms": elapsed.as_millis() as u64,
        });
        println!("{}", serde_json::to_string_pretty(&out)?);
        return Ok(());
    }

    println!();
    if pongs.is_empty() {
        println!(
            "  {} No other instances answered within {} ms",
            style("○").dim(),
            timeout_ms
        );
        println!();
        return Ok(());
    }

    println!(
        "  {} {} instance(s) answered in {} ms",
        style("●").green(),
        style(pongs.len()).bold(),
        elapsed.as_millis()
    );
    println!();
    for pong in &pongs {
        println!("  {}", style(pong.instance_id()).bold());
        for (key, value) in pong.properties() {
            println!("    {}: {}", style(key).dim(), value);
        }
    }
    println!();
    Ok(())
}
