//! Patchline CLI
//!
//! Administrative front end to the patchline library: manage mirror
//! descriptors, query merged version lists and resolve artifact URLs.

mod commands;
mod error;

use clap::{Parser, Subcommand};
use console::style;

use patchline::config::ConfigFile;
use patchline::logging::{init_logging, LoggingGuard};

use commands::config::ConfigCommands;
use commands::mirrors::MirrorCommands;
use error::CliError;

#[derive(Debug, Parser)]
#[command(name = "patchline", version = patchline::VERSION, about)]
struct Cli {
    /// Log at debug level (overridden by PATCHLINE_LOG)
    #[arg(long, short, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Manage mirror descriptors
    #[command(subcommand)]
    Mirrors(MirrorCommands),

    /// List known versions of a branch, newest first
    Versions {
        /// Branch name (e.g. release, beta)
        branch: String,

        /// Ignore the version cache
        #[arg(long)]
        refresh: bool,
    },

    /// Print the URL of a full build, or of a diff with --from
    Resolve {
        branch: String,
        version: u32,

        /// Installed version to patch from
        #[arg(long)]
        from: Option<u32>,
    },

    /// Print the versions to apply in order to go from one build to another
    Sequence { branch: String, from: u32, to: u32 },

    /// Measure latency and throughput of every source
    Speedtest,

    /// View and modify configuration
    #[command(subcommand)]
    Config(ConfigCommands),
}

fn setup_logging(verbose: bool) -> Result<LoggingGuard, CliError> {
    let mut settings = ConfigFile::load().unwrap_or_default().logging;
    if verbose {
        settings.level = "debug".to_string();
    }
    Ok(init_logging(&settings)?)
}

async fn run(cli: Cli) -> Result<(), CliError> {
    match cli.command {
        Commands::Mirrors(command) => commands::mirrors::run(command).await,
        Commands::Versions { branch, refresh } => {
            commands::versions::run_versions(&branch, refresh).await
        }
        Commands::Resolve {
            branch,
            version,
            from,
        } => commands::versions::run_resolve(&branch, version, from).await,
        Commands::Sequence { branch, from, to } => {
            commands::versions::run_sequence(&branch, from, to).await
        }
        Commands::Speedtest => commands::speedtest::run().await,
        Commands::Config(command) => commands::config::run(command),
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let guard = match setup_logging(cli.verbose) {
        Ok(guard) => guard,
        Err(e) => {
            eprintln!("{} {}", style("error:").red().bold(), e);
            std::process::exit(1);
        }
    };

    let result = run(cli).await;
    // Flush the file writer before exiting.
    drop(guard);

    if let Err(e) = result {
        eprintln!("{} {}", style("error:").red().bold(), e);
        std::process::exit(1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_resolve_parses_from_flag() {
        let cli = Cli::try_parse_from(["patchline", "resolve", "beta", "12", "--from", "10"]).unwrap();
        match cli.command {
            Commands::Resolve {
                branch,
                version,
                from,
            } => {
                assert_eq!(branch, "beta");
                assert_eq!(version, 12);
                assert_eq!(from, Some(10));
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_mirrors_remove_accepts_yes() {
        let cli = Cli::try_parse_from(["patchline", "mirrors", "remove", "m1", "-y"]).unwrap();
        assert!(matches!(
            cli.command,
            Commands::Mirrors(MirrorCommands::Remove { yes: true, .. })
        ));
    }
}
