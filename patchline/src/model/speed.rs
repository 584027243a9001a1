//! Speed test results.

use std::time::Duration;

use chrono::{DateTime, Utc};

/// Outcome of one source speed test. Memory-only.
#[derive(Debug, Clone, PartialEq)]
pub struct SpeedTestResult {
    pub source_id: String,
    pub ping_ms: u64,
    pub speed_mbps: f64,
    pub is_available: bool,
    pub tested_at: DateTime<Utc>,
}

impl SpeedTestResult {
    /// A result marking the source unreachable.
    pub fn unavailable(source_id: impl Into<String>) -> Self {
        Self {
            source_id: source_id.into(),
            ping_ms: 0,
            speed_mbps: 0.0,
            is_available: false,
            tested_at: Utc::now(),
        }
    }

    /// True while the result is younger than `ttl`.
    pub fn is_fresh(&self, ttl: Duration) -> bool {
        let age = Utc::now().signed_duration_since(self.tested_at);
        age.to_std().map(|age| age < ttl).unwrap_or(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unavailable_result() {
        let result = SpeedTestResult::unavailable("m1");
        assert!(!result.is_available);
        assert_eq!(result.source_id, "m1");
        assert!(result.is_fresh(Duration::from_secs(60)));
    }

    #[test]
    fn test_stale_result() {
        let mut result = SpeedTestResult::unavailable("m1");
        result.tested_at = Utc::now() - chrono::Duration::minutes(11);
        assert!(!result.is_fresh(Duration::from_secs(600)));
    }
}
