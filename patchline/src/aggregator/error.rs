//! Resolution errors.

use std::fmt;

use thiserror::Error;

/// Result type for URL resolution.
pub type ResolveResult<T> = Result<T, ResolveError>;

/// What a caller asked to resolve.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Artifact {
    Full { version: u32 },
    Diff { from: u32, to: u32 },
}

impl fmt::Display for Artifact {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Artifact::Full { version } => write!(f, "full build {}", version),
            Artifact::Diff { from, to } => write!(f, "diff {} -> {}", from, to),
        }
    }
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ResolveError {
    /// Every source was asked, after a forced refresh, and none had a URL.
    #[error("No source can supply the {artifact} on branch '{branch}'")]
    NoSourceAvailable { branch: String, artifact: Artifact },

    #[error("Resolution of the {artifact} was cancelled")]
    Cancelled { artifact: Artifact },
}
