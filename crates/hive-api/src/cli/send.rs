//! `hive send` -- broadcast one message.

use anyhow::Result;
use console::style;
use hive_core::HiveDriver;

use crate::cli::Output;
use crate::state::AppState;

pub async fn send(state: &AppState, message: &str, output: Output) -> Result<()> {
    let conn = state.connect()?;
    conn.hive.send(message);

    // Give the file time to settle before the driver goes away.
    tokio::time::sleep(state.config.timing.settle_delay()).await;
    let instance_id = conn.driver.instance_id().to_string();
    conn.hive.shutdown();

    match output {
        Output::Json => {
            let sent = serde_json::json!({
                "sent": message,
                "instance_id": instance_id,
                "dir": conn.driver.message_dir().display().to_string(),
            });
            println!("{}", serde_json::to_string_pretty(&sent)?);
        }
        Output::Human => println!(
            "  {} Sent to {}",
            style("✓").green(),
            style(conn.driver.message_dir().display()).cyan()
        ),
        Output::Quiet => {}
    }
    Ok(())
}
