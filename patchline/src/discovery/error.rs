//! Discovery errors.

use std::fmt;

use thiserror::Error;

use super::report::Strategy;

/// Result type for discovery.
pub type DiscoveryResult<T> = Result<T, DiscoveryError>;

/// One failed (candidate, strategy) pairing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProbeAttempt {
    pub candidate: String,
    pub strategy: Strategy,
    pub reason: String,
}

impl fmt::Display for ProbeAttempt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} [{}]: {}", self.candidate, self.strategy, self.reason)
    }
}

/// Reasons discovery produced no descriptor.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum DiscoveryError {
    /// The input could not be turned into an http(s) URL.
    #[error("invalid mirror URL '{input}': {reason}")]
    InvalidUrl { input: String, reason: String },

    /// Every candidate was tried with every strategy.
    #[error("no mirror protocol detected for {url} ({} probes failed)", attempts.len())]
    Exhausted {
        url: String,
        attempts: Vec<ProbeAttempt>,
    },

    /// The caller cancelled discovery.
    #[error("discovery of {url} was cancelled")]
    Cancelled { url: String },
}
