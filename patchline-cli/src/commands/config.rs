//! `patchline config`: inspect and edit `config.ini`.
//!
//! Unset keys are shown with the value actually in effect, so `list` doubles
//! as a view of where mirrors, caches and sessions live on this machine.

use clap::Subcommand;
use console::style;

use patchline::config::{config_file_path, ConfigFile, ConfigKey};

use crate::error::CliError;

#[derive(Debug, Subcommand)]
pub enum ConfigCommands {
    /// Print one setting (section.key, e.g. official.api_base)
    Get { key: String },

    /// Change one setting; an empty value clears optional keys
    Set { key: String, value: String },

    /// Show every setting with its effective value
    List,

    /// Print the configuration file location
    Path,
}

pub fn run(command: ConfigCommands) -> Result<(), CliError> {
    match command {
        ConfigCommands::Get { key } => run_get(&key),
        ConfigCommands::Set { key, value } => run_set(&key, &value),
        ConfigCommands::List => run_list(),
        ConfigCommands::Path => run_path(),
    }
}

fn parse_key(key: &str) -> Result<ConfigKey, CliError> {
    key.parse().map_err(|_| {
        let known: Vec<&str> = ConfigKey::all().iter().map(ConfigKey::name).collect();
        CliError::Config(format!("Unknown key '{}'. Known keys: {}", key, known.join(", ")))
    })
}

/// Configured value, or the effective default marked as such.
fn render(key: ConfigKey, config: &ConfigFile) -> String {
    let value = key.get(config);
    if !value.is_empty() {
        return value;
    }
    match key.effective(config) {
        effective if effective.is_empty() => style("(unset)").dim().to_string(),
        effective => format!("{} {}", effective, style("(default)").dim()),
    }
}

fn run_get(key: &str) -> Result<(), CliError> {
    let key = parse_key(key)?;
    let config = ConfigFile::load()?;
    println!("{}", render(key, &config));
    Ok(())
}

fn run_set(key: &str, value: &str) -> Result<(), CliError> {
    let key = parse_key(key)?;
    let mut config = ConfigFile::load()?;
    key.set(&mut config, value)?;
    config.save()?;

    match key.get(&config) {
        stored if stored.is_empty() => println!("Cleared {}", key.name()),
        stored => println!("{} = {}", key.name(), stored),
    }
    Ok(())
}

fn run_list() -> Result<(), CliError> {
    let config = ConfigFile::load()?;
    println!("# {}", config_file_path().display());

    let mut section = "";
    for key in ConfigKey::all().iter().copied() {
        if key.section() != section {
            section = key.section();
            println!();
            println!("{}", style(format!("[{}]", section)).bold());
        }
        println!("  {} = {}", key.key_name(), render(key, &config));
        println!("    {}", style(key.description()).dim());
    }
    Ok(())
}

fn run_path() -> Result<(), CliError> {
    let path = config_file_path();
    if path.exists() {
        println!("{}", path.display());
    } else {
        println!("{} {}", path.display(), style("(not created yet)").dim());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unknown_key_lists_known_keys() {
        let err = parse_key("cache.size").unwrap_err().to_string();
        assert!(err.contains("cache.size"));
        assert!(err.contains("cache.version_ttl_minutes"));
        assert_eq!(parse_key("LOGGING.level").unwrap(), ConfigKey::LoggingLevel);
    }

    #[test]
    fn test_render_prefers_configured_value() {
        let mut config = ConfigFile::default();
        ConfigKey::PlatformOs.set(&mut config, "linux").unwrap();
        assert_eq!(render(ConfigKey::PlatformOs, &config), "linux");
        assert!(render(ConfigKey::StorageDataDir, &config).contains(&config.data_dir().display().to_string()));
    }
}
