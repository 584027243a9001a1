//! `patchline speedtest`

use console::style;

use super::common::{cancel_on_ctrl_c, spinner, Context};
use crate::error::CliError;

pub async fn run() -> Result<(), CliError> {
    let ctx = Context::load()?;
    let aggregator = ctx.aggregator()?;
    if aggregator.sources().is_empty() {
        println!("No sources configured.");
        return Ok(());
    }

    let cancel = cancel_on_ctrl_c()?;
    let progress = spinner(format!("Testing {} sources", aggregator.sources().len()));
    let results = aggregator.speed_test_all(&cancel).await;
    progress.finish_and_clear();
    if cancel.is_cancelled() {
        return Err(CliError::Cancelled);
    }

    println!("{:<24} {:>9} {:>10}", "SOURCE", "PING", "SPEED");
    for result in &results {
        if result.is_available {
            println!(
                "{:<24} {:>7}ms {:>6.1}Mbps",
                result.source_id, result.ping_ms, result.speed_mbps
            );
        } else {
            println!(
                "{:<24} {:>9} {:>10}",
                result.source_id,
                style("-").dim(),
                style("unreachable").red()
            );
        }
    }

    if let Some(best) = results.iter().find(|r| r.is_available) {
        println!();
        println!("Fastest: {}", style(&best.source_id).green());
    }
    Ok(())
}
