//! Configuration for the vendor source.

use std::path::PathBuf;
use std::time::Duration;

/// User agent presented to the vendor API.
pub const DESKTOP_USER_AGENT: &str =
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0.0.0 Safari/537.36";

/// Configuration for [`OfficialSource`](super::OfficialSource).
#[derive(Debug, Clone)]
pub struct OfficialConfig {
    /// API root; patch queries go to `{api_base}/patches/...`.
    pub api_base: String,

    /// User agent sent with every request.
    pub user_agent: String,

    /// Where the incremental chain snapshot is written. `None` disables it.
    pub snapshot_path: Option<PathBuf>,

    /// Priority of the official source among all sources.
    pub priority: i32,

    /// Lifetime of cached patch responses.
    pub cache_ttl: Duration,

    /// Timeout for one API request.
    pub request_timeout: Duration,

    /// Lifetime of a speed test result.
    pub speed_test_ttl: Duration,
}

impl Default for OfficialConfig {
    fn default() -> Self {
        Self {
            api_base: String::new(),
            user_agent: DESKTOP_USER_AGENT.to_string(),
            snapshot_path: None,
            priority: 0,
            cache_ttl: Duration::from_secs(15 * 60),
            request_timeout: Duration::from_secs(30),
            speed_test_ttl: Duration::from_secs(10 * 60),
        }
    }
}

impl OfficialConfig {
    /// Create a configuration for the given API root.
    pub fn new(api_base: impl Into<String>) -> Self {
        Self {
            api_base: api_base.into(),
            ..Default::default()
        }
    }

    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }

    pub fn with_snapshot_path(mut self, path: PathBuf) -> Self {
        self.snapshot_path = Some(path);
        self
    }

    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    pub fn with_cache_ttl(mut self, ttl: Duration) -> Self {
        self.cache_ttl = ttl;
        self
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = OfficialConfig::new("https://api.example");
        assert_eq!(config.cache_ttl, Duration::from_secs(900));
        assert_eq!(config.request_timeout, Duration::from_secs(30));
        assert_eq!(config.speed_test_ttl, Duration::from_secs(600));
        assert!(config.snapshot_path.is_none());
        assert!(config.user_agent.starts_with("Mozilla/5.0"));
    }

    #[test]
    fn test_builder() {
        let config = OfficialConfig::new("https://api.example")
            .with_priority(-1)
            .with_snapshot_path(PathBuf::from("/tmp/p.json"))
            .with_user_agent("ua");
        assert_eq!(config.priority, -1);
        assert_eq!(config.user_agent, "ua");
        assert_eq!(config.snapshot_path, Some(PathBuf::from("/tmp/p.json")));
    }
}
