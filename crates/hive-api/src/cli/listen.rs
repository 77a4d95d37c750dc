//! `hive listen` -- print incoming messages.

use std::collections::BTreeMap;

use anyhow::Result;
use console::style;
use hive_core::HiveDriver;
use tokio::sync::mpsc;

use crate::cli::Output;
use crate::state::AppState;

/// Print every application message until `count` were seen or Ctrl+C.
///
/// The instance answers pings while listening, advertising `props`.
pub async fn listen(
    state: &AppState,
    count: Option<usize>,
    props: Vec<(String, String)>,
    output: Output,
) -> Result<()> {
    let conn = state.connect()?;
    conn.hive
        .set_instance_properties(props.into_iter().collect::<BTreeMap<_, _>>());

    let (tx, mut rx) = mpsc::unbounded_channel::<String>();
    conn.hive.subscribe(move |message| {
        tx.send(message.to_string())?;
        Ok(())
    });

    if output == Output::Human {
        println!();
        println!(
            "  {} Listening as {} in {}",
            style("●").green(),
            style(conn.driver.instance_id()).bold(),
            style(conn.driver.message_dir().display()).cyan()
        );
        println!("  {}", style("Press Ctrl+C to stop").dim());
        println!();
    }

    let mut received = 0usize;
    loop {
        if count.is_some_and(|limit| received >= limit) {
            break;
        }
        tokio::select! {
            message = rx.recv() => {
                let Some(message) = message else { break };
                received += 1;
                match output {
                    Output::Json => println!("{}", serde_json::json!({ "message": message })),
                    Output::Human => println!("  {} {}", style("←").cyan(), message),
                    Output::Quiet => {}
                }
            }
            _ = tokio::signal::ctrl_c() => break,
        }
    }

    conn.hive.shutdown();
    if output == Output::Human {
        println!();
        println!("  Stopped after {} message(s).", received);
    }
    Ok(())
}
