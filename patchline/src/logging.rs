//! Tracing subscriber setup for binaries.
//!
//! Events go to stderr and, when a log directory is configured, to a
//! daily-rolling file written by a background thread. The returned
//! [`LoggingGuard`] flushes that file on drop, so hold it for the whole
//! process lifetime.

use std::io;

use thiserror::Error;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

use crate::config::LoggingSettings;

/// Environment variable that overrides the configured filter.
pub const LOG_ENV_VAR: &str = "PATCHLINE_LOG";

const LOG_FILE_PREFIX: &str = "patchline.log";

#[derive(Debug, Error)]
pub enum LoggingError {
    #[error("Invalid log filter '{directive}': {reason}")]
    Filter { directive: String, reason: String },

    #[error("Cannot create log directory: {0}")]
    Io(#[from] io::Error),

    #[error("Logging already initialized: {0}")]
    Init(String),
}

/// Keeps the file writer alive.
#[must_use = "dropping the guard stops file logging"]
pub struct LoggingGuard {
    _file: Option<WorkerGuard>,
}

/// The filter in effect: `PATCHLINE_LOG` if set and valid, else the
/// configured level.
pub fn build_filter(settings: &LoggingSettings) -> Result<EnvFilter, LoggingError> {
    if let Ok(filter) = EnvFilter::try_from_env(LOG_ENV_VAR) {
        return Ok(filter);
    }
    EnvFilter::try_new(&settings.level).map_err(|e| LoggingError::Filter {
        directive: settings.level.clone(),
        reason: e.to_string(),
    })
}

/// Install the global subscriber.
pub fn init_logging(settings: &LoggingSettings) -> Result<LoggingGuard, LoggingError> {
    let filter = build_filter(settings)?;

    let stderr_layer = fmt::layer().with_writer(io::stderr).with_target(false);

    let (file_layer, guard) = match &settings.directory {
        Some(dir) => {
            std::fs::create_dir_all(dir)?;
            let appender = tracing_appender::rolling::daily(dir, LOG_FILE_PREFIX);
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let layer = fmt::layer().with_writer(writer).with_ansi(false);
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(stderr_layer)
        .with(file_layer)
        .try_init()
        .map_err(|e| LoggingError::Init(e.to_string()))?;

    Ok(LoggingGuard { _file: guard })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_configured_level_builds_filter() {
        let settings = LoggingSettings {
            level: "patchline=debug,warn".to_string(),
            directory: None,
        };
        assert!(build_filter(&settings).is_ok());
    }
}
