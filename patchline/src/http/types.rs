//! Request, response and error types for the HTTP transport.

use std::time::Duration;

use bytes::Bytes;
use serde::de::DeserializeOwned;
use thiserror::Error;

/// Default timeout applied to requests that do not set one.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Result type for transport operations.
pub type HttpResult<T> = Result<T, HttpError>;

/// Errors produced by the transport.
///
/// A non-success status code is *not* an error; callers inspect
/// [`HttpResponse::status`] themselves.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum HttpError {
    /// The request could not be sent or the body could not be read.
    #[error("request to {url} failed: {reason}")]
    Request { url: String, reason: String },

    /// The request exceeded its timeout.
    #[error("request to {url} timed out after {timeout_secs}s")]
    Timeout { url: String, timeout_secs: u64 },

    /// The caller cancelled the request.
    #[error("request to {url} was cancelled")]
    Cancelled { url: String },

    /// The body could not be decoded as expected.
    #[error("failed to decode response from {url}: {reason}")]
    Decode { url: String, reason: String },

    /// The underlying client could not be constructed.
    #[error("failed to create HTTP client: {0}")]
    Client(String),
}

/// HTTP method subset used by this crate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HttpMethod {
    Get,
    Head,
}

/// A single outbound request.
#[derive(Debug, Clone)]
pub struct HttpRequest {
    pub method: HttpMethod,
    pub url: String,
    pub headers: Vec<(String, String)>,
    pub timeout: Duration,
    /// Stop reading the body after this many bytes.
    pub max_body_bytes: Option<usize>,
}

impl HttpRequest {
    /// Create a GET request with the default timeout.
    pub fn get(url: impl Into<String>) -> Self {
        Self::new(HttpMethod::Get, url)
    }

    /// Create a HEAD request with the default timeout.
    pub fn head(url: impl Into<String>) -> Self {
        Self::new(HttpMethod::Head, url)
    }

    fn new(method: HttpMethod, url: impl Into<String>) -> Self {
        Self {
            method,
            url: url.into(),
            headers: Vec::new(),
            timeout: DEFAULT_TIMEOUT,
            max_body_bytes: None,
        }
    }

    /// Add a request header.
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    /// Add an `Authorization: Bearer` header.
    pub fn with_bearer(self, token: &str) -> Self {
        self.with_header("Authorization", format!("Bearer {}", token))
    }

    /// Request only the first `len` bytes of the resource.
    pub fn with_prefix_range(self, len: usize) -> Self {
        let end = len.saturating_sub(1);
        self.with_header("Range", format!("bytes=0-{}", end))
            .with_body_limit(len)
    }

    /// Set the request timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Cap the number of body bytes read.
    pub fn with_body_limit(mut self, limit: usize) -> Self {
        self.max_body_bytes = Some(limit);
        self
    }

    /// Look up a header value (case-insensitive).
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

/// A received response.
#[derive(Debug, Clone)]
pub struct HttpResponse {
    pub status: u16,
    pub body: Bytes,
}

impl HttpResponse {
    /// Build a response from a status code and body.
    pub fn new(status: u16, body: impl Into<Bytes>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }

    /// True for 2xx statuses.
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// True when the server rejected our credentials.
    pub fn is_auth_failure(&self) -> bool {
        self.status == 401 || self.status == 403
    }

    /// True when the response proves the endpoint exists.
    ///
    /// Many origins reject HEAD or unexpected parameters with 400, 405 or
    /// 422 while still serving the real request.
    pub fn endpoint_exists(&self) -> bool {
        (200..400).contains(&self.status) || matches!(self.status, 400 | 405 | 422)
    }

    /// Body decoded as UTF-8, lossily.
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }

    /// Body decoded as JSON.
    pub fn json<T: DeserializeOwned>(&self, url: &str) -> HttpResult<T> {
        serde_json::from_slice(&self.body).map_err(|e| HttpError::Decode {
            url: url.to_string(),
            reason: e.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prefix_range_header() {
        let request = HttpRequest::get("https://example.com/a").with_prefix_range(1024);
        assert_eq!(request.header("range"), Some("bytes=0-1023"));
        assert_eq!(request.max_body_bytes, Some(1024));
    }

    #[test]
    fn test_bearer_header() {
        let request = HttpRequest::get("https://example.com").with_bearer("abc");
        assert_eq!(request.header("Authorization"), Some("Bearer abc"));
    }

    #[test]
    fn test_endpoint_exists_accepts_rejection_codes() {
        for status in [200, 204, 301, 400, 405, 422] {
            assert!(HttpResponse::new(status, "").endpoint_exists(), "{}", status);
        }
        for status in [404, 410, 500, 503] {
            assert!(!HttpResponse::new(status, "").endpoint_exists(), "{}", status);
        }
    }

    #[test]
    fn test_auth_failure_statuses() {
        assert!(HttpResponse::new(401, "").is_auth_failure());
        assert!(HttpResponse::new(403, "").is_auth_failure());
        assert!(!HttpResponse::new(404, "").is_auth_failure());
    }

    #[test]
    fn test_json_decode_error_names_url() {
        let response = HttpResponse::new(200, "not json");
        let err = response
            .json::<serde_json::Value>("https://example.com/x")
            .unwrap_err();
        assert!(err.to_string().contains("https://example.com/x"));
    }
}
