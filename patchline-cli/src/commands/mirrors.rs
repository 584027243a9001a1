//! Mirror administration: list, inspect, toggle, remove, discover.

use clap::Subcommand;
use console::style;
use dialoguer::Confirm;

use patchline::descriptor::{MirrorDescriptor, MirrorProtocol, VersionDiscovery};
use patchline::discovery::{DiscoveryError, MirrorProber};

use super::common::{cancel_on_ctrl_c, spinner, Context};
use crate::error::CliError;

#[derive(Debug, Subcommand)]
pub enum MirrorCommands {
    /// List configured mirrors in priority order
    List,

    /// Show a mirror's descriptor
    Show {
        /// Mirror id
        id: String,
    },

    /// Delete a mirror's descriptor file
    Remove {
        /// Mirror id
        id: String,

        /// Skip the confirmation prompt
        #[arg(long, short)]
        yes: bool,
    },

    /// Enable a mirror
    Enable {
        /// Mirror id
        id: String,
    },

    /// Disable a mirror without deleting it
    Disable {
        /// Mirror id
        id: String,
    },

    /// Probe a URL and build a descriptor for it
    Discover {
        /// Any URL on the mirror
        url: String,

        /// Save the descriptor
        #[arg(long)]
        save: bool,
    },
}

pub async fn run(command: MirrorCommands) -> Result<(), CliError> {
    let ctx = Context::load()?;
    match command {
        MirrorCommands::List => run_list(&ctx),
        MirrorCommands::Show { id } => run_show(&ctx, &id),
        MirrorCommands::Remove { id, yes } => run_remove(&ctx, &id, yes),
        MirrorCommands::Enable { id } => run_toggle(&ctx, &id, true),
        MirrorCommands::Disable { id } => run_toggle(&ctx, &id, false),
        MirrorCommands::Discover { url, save } => run_discover(&ctx, &url, save).await,
    }
}

fn summary(descriptor: &MirrorDescriptor) -> String {
    match &descriptor.protocol {
        MirrorProtocol::Pattern(config) => {
            let method = match &config.version_discovery {
                VersionDiscovery::JsonApi { .. } => "json-api",
                VersionDiscovery::HtmlAutoindex { .. } => "html-autoindex",
                VersionDiscovery::StaticList { .. } => "static-list",
            };
            format!("pattern/{} {}", method, config.base_url)
        }
        MirrorProtocol::JsonIndex(config) => format!("json-index {}", config.api_url),
    }
}

fn run_list(ctx: &Context) -> Result<(), CliError> {
    let descriptors = ctx.store.load()?;
    if descriptors.is_empty() {
        println!("No mirrors configured in {}", ctx.store.dir().display());
        println!("Add one with 'patchline mirrors discover <url> --save'.");
        return Ok(());
    }

    println!("{:<24} {:>8}  {:<8}  SOURCE", "ID", "PRIORITY", "STATE");
    for descriptor in &descriptors {
        let state = if descriptor.enabled {
            style("enabled").green()
        } else {
            style("disabled").dim()
        };
        println!(
            "{:<24} {:>8}  {:<8}  {}",
            descriptor.id,
            descriptor.priority,
            state,
            summary(descriptor)
        );
    }
    Ok(())
}

fn run_show(ctx: &Context, id: &str) -> Result<(), CliError> {
    let descriptor = ctx
        .store
        .get(id)?
        .ok_or_else(|| CliError::MirrorNotFound(id.to_string()))?;
    let json = descriptor
        .to_json_pretty()
        .map_err(|e| CliError::Config(e.to_string()))?;
    println!("{}", json);
    Ok(())
}

fn run_remove(ctx: &Context, id: &str, yes: bool) -> Result<(), CliError> {
    if !ctx.store.exists(id) {
        return Err(CliError::MirrorNotFound(id.to_string()));
    }

    let confirmed = yes
        || Confirm::new()
            .with_prompt(format!("Remove mirror '{}'?", id))
            .default(false)
            .interact()
            .unwrap_or(false);
    if !confirmed {
        println!("Aborted.");
        return Ok(());
    }

    ctx.store.delete(id)?;
    println!("Removed {}", id);
    Ok(())
}

fn run_toggle(ctx: &Context, id: &str, enabled: bool) -> Result<(), CliError> {
    if !ctx.store.exists(id) {
        return Err(CliError::MirrorNotFound(id.to_string()));
    }
    let descriptor = ctx.store.set_enabled(id, enabled)?;
    println!(
        "{} {}",
        if descriptor.enabled { "Enabled" } else { "Disabled" },
        descriptor.id
    );
    Ok(())
}

async fn run_discover(ctx: &Context, url: &str, save: bool) -> Result<(), CliError> {
    let cancel = cancel_on_ctrl_c()?;
    let progress = spinner(format!("Probing {}", url));
    let result = MirrorProber::new(ctx.http.clone())
        .discover(url, &cancel)
        .await;
    progress.finish_and_clear();

    let report = match result {
        Ok(report) => report,
        Err(DiscoveryError::Exhausted { url, attempts }) => {
            eprintln!("{} no mirror protocol detected for {}", style("error:").red(), url);
            for attempt in &attempts {
                eprintln!("  {}", style(attempt).dim());
            }
            return Err(CliError::Discovery(DiscoveryError::Exhausted { url, attempts }));
        }
        Err(e) => return Err(e.into()),
    };

    println!(
        "Detected {} at {} (via {})",
        style(report.strategy).cyan(),
        report.candidate,
        report.probe_url
    );
    let json = report
        .descriptor
        .to_json_pretty()
        .map_err(|e| CliError::Config(e.to_string()))?;
    println!("{}", json);

    if save {
        let path = ctx.store.save(&report.descriptor)?;
        println!("Saved to {}", path.display());
    }
    Ok(())
}
