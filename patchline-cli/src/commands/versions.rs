//! Version queries through the aggregator.

use console::style;

use patchline::model::VersionEntry;

use super::common::{cancel_on_ctrl_c, spinner, Context};
use crate::error::CliError;

/// `patchline versions <branch>`
pub async fn run_versions(branch: &str, refresh: bool) -> Result<(), CliError> {
    let ctx = Context::load()?;
    let aggregator = ctx.aggregator()?;
    let cancel = cancel_on_ctrl_c()?;

    let progress = spinner(format!("Fetching {} versions for {}", branch, ctx.platform));
    let versions = aggregator.get_versions(branch, refresh, &cancel).await;
    progress.finish_and_clear();
    if cancel.is_cancelled() {
        return Err(CliError::Cancelled);
    }

    if versions.is_empty() {
        println!("No versions found for branch '{}' on {}", branch, ctx.platform);
        return Ok(());
    }
    if aggregator.is_official_down(branch) {
        println!(
            "{} official API unavailable, listing from mirrors",
            style("note:").yellow()
        );
    }

    println!("{:>10}  {:<10}  URL", "VERSION", "KIND");
    for entry in &versions {
        print_entry(entry);
    }
    Ok(())
}

fn print_entry(entry: &VersionEntry) {
    let kind = if entry.is_full_build() {
        "full".to_string()
    } else {
        format!("diff<-{}", entry.from_version)
    };
    println!("{:>10}  {:<10}  {}", entry.version, kind, entry.artifact_url);
}

/// `patchline resolve <branch> <version> [--from <v>]`
pub async fn run_resolve(branch: &str, version: u32, from: Option<u32>) -> Result<(), CliError> {
    let ctx = Context::load()?;
    let aggregator = ctx.aggregator()?;
    let cancel = cancel_on_ctrl_c()?;

    let url = match from {
        Some(from) => aggregator.resolve_diff_url(branch, from, version, &cancel).await?,
        None => aggregator.resolve_download_url(branch, version, &cancel).await?,
    };
    println!("{}", url);
    Ok(())
}

/// `patchline sequence <branch> <from> <to>`
pub async fn run_sequence(branch: &str, from: u32, to: u32) -> Result<(), CliError> {
    let ctx = Context::load()?;
    let aggregator = ctx.aggregator()?;
    let cancel = cancel_on_ctrl_c()?;

    let steps = aggregator.patch_sequence(branch, from, to, &cancel).await;
    if cancel.is_cancelled() {
        return Err(CliError::Cancelled);
    }

    if steps.is_empty() {
        println!("Nothing to apply between {} and {}", from, to);
        return Ok(());
    }
    let rendered: Vec<String> = steps.iter().map(u32::to_string).collect();
    println!("{} -> {}", from, rendered.join(" -> "));
    Ok(())
}
