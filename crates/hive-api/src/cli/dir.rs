//! `hive dir` -- show where messages live.

use std::path::Path;

use anyhow::Result;
use console::style;
use hive_infra::filewatcher::MESSAGE_EXTENSION;

use crate::cli::Output;
use crate::state::AppState;

pub async fn dir(state: &AppState, output: Output) -> Result<()> {
    let dir = state.message_dir()?;
    let exists = dir.is_dir();
    let pending = if exists { count_messages(&dir)? } else { 0 };

    if output == Output::Quiet {
        return Ok(());
    }
    if output == Output::Json {
        let out = serde_json::json!({
            "dir": dir.display().to_string(),
            "exists": exists,
            "messages": pending,
        });
        println!("{}", serde_json::to_string_pretty(&out)?);
        return Ok(());
    }

    println!();
    println!("  Directory: {}", style(dir.display()).cyan());
    if exists {
        println!("  Messages:  {}", style(pending).bold());
    } else {
        println!("  {}", style("(not created yet)").dim());
    }
    println!();
    Ok(())
}

fn count_messages(dir: &Path) -> Result<usize> {
    let mut count = 0;
    for entry in std::fs::read_dir(dir)? {
        if entry?.path().extension().is_some_and(|ext| ext == MESSAGE_EXTENSION) {
            count += 1;
        }
    }
    Ok(count)
}
