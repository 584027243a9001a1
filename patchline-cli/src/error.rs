//! CLI error type.

use std::fmt;

use patchline::aggregator::ResolveError;
use patchline::config::ConfigError;
use patchline::discovery::DiscoveryError;
use patchline::http::HttpError;
use patchline::logging::LoggingError;
use patchline::store::StoreError;

/// Errors surfaced to the user, one variant per failing area.
#[derive(Debug)]
pub enum CliError {
    Config(String),
    Logging(LoggingError),
    Http(HttpError),
    Store(StoreError),
    Discovery(DiscoveryError),
    Resolve(ResolveError),
    MirrorNotFound(String),
    Cancelled,
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CliError::Config(msg) => write!(f, "Configuration error: {}", msg),
            CliError::Logging(e) => write!(f, "Logging setup failed: {}", e),
            CliError::Http(e) => write!(f, "HTTP client error: {}", e),
            CliError::Store(e) => write!(f, "Mirror store error: {}", e),
            CliError::Discovery(e) => write!(f, "Discovery failed: {}", e),
            CliError::Resolve(e) => write!(f, "{}", e),
            CliError::MirrorNotFound(id) => {
                write!(f, "No mirror with id '{}'. Use 'patchline mirrors list' to see ids.", id)
            }
            CliError::Cancelled => write!(f, "Interrupted"),
        }
    }
}

impl std::error::Error for CliError {}

impl From<ConfigError> for CliError {
    fn from(e: ConfigError) -> Self {
        CliError::Config(e.to_string())
    }
}

impl From<LoggingError> for CliError {
    fn from(e: LoggingError) -> Self {
        CliError::Logging(e)
    }
}

impl From<HttpError> for CliError {
    fn from(e: HttpError) -> Self {
        CliError::Http(e)
    }
}

impl From<StoreError> for CliError {
    fn from(e: StoreError) -> Self {
        CliError::Store(e)
    }
}

impl From<DiscoveryError> for CliError {
    fn from(e: DiscoveryError) -> Self {
        match e {
            DiscoveryError::Cancelled { .. } => CliError::Cancelled,
            other => CliError::Discovery(other),
        }
    }
}

impl From<ResolveError> for CliError {
    fn from(e: ResolveError) -> Self {
        match e {
            ResolveError::Cancelled { .. } => CliError::Cancelled,
            other => CliError::Resolve(other),
        }
    }
}
