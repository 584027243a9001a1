//! Shared speed-test routine.

use std::time::{Duration, Instant};

use parking_lot::RwLock;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::http::{HttpClient, HttpRequest};
use crate::model::SpeedTestResult;

/// Upper bound on bytes read while measuring throughput.
pub const MAX_SPEED_TEST_BYTES: usize = 10 * 1024 * 1024;

const BYTES_PER_MB: f64 = 1024.0 * 1024.0;

/// Ping the source, then read a prefix of a real payload.
///
/// The ping counts as successful for any status that proves the endpoint
/// exists, including 400/405/422 from origins that reject HEAD. Throughput
/// is computed from the bytes actually read. Any failure yields an
/// unavailable result.
pub async fn measure_speed(
    http: &dyn HttpClient,
    source_id: &str,
    ping: HttpRequest,
    payload: Option<HttpRequest>,
    cancel: &CancellationToken,
) -> SpeedTestResult {
    let ping_url = ping.url.clone();
    let started = Instant::now();
    let ping_ms = match http.execute(ping, cancel).await {
        Ok(response) if response.endpoint_exists() => started.elapsed().as_millis() as u64,
        Ok(response) => {
            debug!(source = %source_id, url = %ping_url, status = response.status, "Ping rejected");
            return SpeedTestResult::unavailable(source_id);
        }
        Err(e) => {
            debug!(source = %source_id, error = %e, "Ping failed");
            return SpeedTestResult::unavailable(source_id);
        }
    };

    let speed_mbps = match payload {
        None => 0.0,
        Some(request) => {
            let request = request.with_prefix_range(MAX_SPEED_TEST_BYTES);
            let payload_url = request.url.clone();
            let started = Instant::now();
            match http.execute(request, cancel).await {
                Ok(response) if response.is_success() => {
                    let elapsed = started.elapsed().as_secs_f64().max(0.001);
                    response.body.len() as f64 / BYTES_PER_MB / elapsed
                }
                Ok(response) => {
                    debug!(source = %source_id, url = %payload_url, status = response.status, "Payload rejected");
                    return SpeedTestResult::unavailable(source_id);
                }
                Err(e) => {
                    debug!(source = %source_id, error = %e, "Payload download failed");
                    return SpeedTestResult::unavailable(source_id);
                }
            }
        }
    };

    SpeedTestResult {
        source_id: source_id.to_string(),
        ping_ms,
        speed_mbps,
        is_available: true,
        tested_at: chrono::Utc::now(),
    }
}

/// Holder for a source's latest speed result.
pub struct SpeedSlot {
    ttl: Duration,
    last: RwLock<Option<SpeedTestResult>>,
}

impl SpeedSlot {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            last: RwLock::new(None),
        }
    }

    /// The stored result if it is younger than the TTL.
    pub fn fresh(&self) -> Option<SpeedTestResult> {
        self.last
            .read()
            .as_ref()
            .filter(|result| result.is_fresh(self.ttl))
            .cloned()
    }

    pub fn store(&self, result: SpeedTestResult) -> SpeedTestResult {
        *self.last.write() = Some(result.clone());
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::{HttpError, MockHttpClient};

    #[tokio::test]
    async fn test_head_rejection_still_counts_as_reachable() {
        let mock = MockHttpClient::new();
        mock.on_head("https://m/ping", 405);
        mock.on_get("https://m/payload", 206, "0123456789");
        let cancel = CancellationToken::new();

        let result = measure_speed(
            &mock,
            "m",
            HttpRequest::head("https://m/ping"),
            Some(HttpRequest::get("https://m/payload")),
            &cancel,
        )
        .await;

        assert!(result.is_available);
        assert!(result.speed_mbps > 0.0);
    }

    #[tokio::test]
    async fn test_payload_request_is_range_limited() {
        let mock = MockHttpClient::new();
        mock.on_head("https://m/ping", 200);
        mock.on_get("https://m/payload", 200, "data");
        let cancel = CancellationToken::new();

        measure_speed(
            &mock,
            "m",
            HttpRequest::head("https://m/ping"),
            Some(HttpRequest::get("https://m/payload")),
            &cancel,
        )
        .await;

        let payload = mock
            .requests()
            .into_iter()
            .find(|r| r.url == "https://m/payload")
            .unwrap();
        assert_eq!(payload.header("range"), Some("bytes=0-10485759"));
        assert_eq!(payload.max_body_bytes, Some(MAX_SPEED_TEST_BYTES));
    }

    #[tokio::test]
    async fn test_failures_mark_unavailable() {
        let mock = MockHttpClient::new();
        let cancel = CancellationToken::new();

        // Unknown route answers 404, which does not prove existence.
        let result = measure_speed(&mock, "m", HttpRequest::head("https://m/none"), None, &cancel).await;
        assert!(!result.is_available);

        mock.on_head("https://m/ping", 200);
        mock.fail_get(
            "https://m/payload",
            HttpError::Timeout {
                url: "https://m/payload".to_string(),
                timeout_secs: 30,
            },
        );
        let result = measure_speed(
            &mock,
            "m",
            HttpRequest::head("https://m/ping"),
            Some(HttpRequest::get("https://m/payload")),
            &cancel,
        )
        .await;
        assert!(!result.is_available);
    }

    #[test]
    fn test_speed_slot_expires() {
        let slot = SpeedSlot::new(Duration::from_secs(600));
        assert!(slot.fresh().is_none());

        let mut result = SpeedTestResult::unavailable("m");
        slot.store(result.clone());
        assert!(slot.fresh().is_some());

        result.tested_at = chrono::Utc::now() - chrono::Duration::minutes(20);
        slot.store(result);
        assert!(slot.fresh().is_none());
    }
}
