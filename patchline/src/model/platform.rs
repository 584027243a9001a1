//! Platform identification and cache keys.

use std::fmt;

use serde::{Deserialize, Serialize};

/// An operating system / architecture pair in vendor token form
/// (`windows|linux|darwin`, `amd64|arm64`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Platform {
    pub os: String,
    pub arch: String,
}

impl Platform {
    pub fn new(os: impl Into<String>, arch: impl Into<String>) -> Self {
        Self {
            os: os.into(),
            arch: arch.into(),
        }
    }

    /// The platform this process runs on.
    pub fn host() -> Self {
        Self::new(
            Self::vendor_os(std::env::consts::OS),
            Self::vendor_arch(std::env::consts::ARCH),
        )
    }

    /// Map a Rust OS name to the vendor token.
    pub fn vendor_os(os: &str) -> &str {
        match os {
            "macos" => "darwin",
            other => other,
        }
    }

    /// Map a Rust architecture name to the vendor token.
    pub fn vendor_arch(arch: &str) -> &str {
        match arch {
            "x86_64" => "amd64",
            "aarch64" => "arm64",
            "x86" => "386",
            other => other,
        }
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.os, self.arch)
    }
}

/// Cache key for per-branch version data.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct BranchKey {
    pub platform: Platform,
    pub branch: String,
}

impl BranchKey {
    pub fn new(platform: &Platform, branch: &str) -> Self {
        Self {
            platform: platform.clone(),
            branch: branch.to_string(),
        }
    }
}

/// Cache key for a vendor patch query.
///
/// `from_build == 0` asks for the newest full build, `from_build == 1`
/// for the full incremental chain.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PatchQuery {
    pub platform: Platform,
    pub branch: String,
    pub from_build: u32,
}

impl PatchQuery {
    pub fn new(platform: &Platform, branch: &str, from_build: u32) -> Self {
        Self {
            platform: platform.clone(),
            branch: branch.to_string(),
            from_build,
        }
    }
}
