//! HTTP client trait and the reqwest implementation.

use std::time::Duration;

use bytes::BytesMut;
use futures::future::BoxFuture;
use tokio_util::sync::CancellationToken;

use super::types::{HttpError, HttpMethod, HttpRequest, HttpResponse, HttpResult};

/// User agent sent when a request does not set its own.
pub const DEFAULT_USER_AGENT: &str = concat!("patchline/", env!("CARGO_PKG_VERSION"));

/// Trait for HTTP client operations.
///
/// This abstraction allows for dependency injection and easier testing
/// by enabling mock HTTP clients in tests. It is dyn-compatible so sources
/// can share one `Arc<dyn HttpClient>`.
pub trait HttpClient: Send + Sync {
    /// Execute a request, honouring its timeout and the cancellation token.
    fn execute<'a>(
        &'a self,
        request: HttpRequest,
        cancel: &'a CancellationToken,
    ) -> BoxFuture<'a, HttpResult<HttpResponse>>;
}

/// Real HTTP client implementation using reqwest.
#[derive(Debug, Clone)]
pub struct ReqwestHttpClient {
    client: reqwest::Client,
}

impl ReqwestHttpClient {
    /// Creates a new client with the default user agent.
    pub fn new() -> HttpResult<Self> {
        Self::with_user_agent(DEFAULT_USER_AGENT)
    }

    /// Creates a new client with a custom user agent.
    pub fn with_user_agent(user_agent: &str) -> HttpResult<Self> {
        let client = reqwest::Client::builder()
            .user_agent(user_agent)
            .connect_timeout(Duration::from_secs(10))
            .build()
            .map_err(|e| HttpError::Client(e.to_string()))?;

        Ok(Self { client })
    }

    async fn perform(&self, request: &HttpRequest) -> HttpResult<HttpResponse> {
        let method = match request.method {
            HttpMethod::Get => reqwest::Method::GET,
            HttpMethod::Head => reqwest::Method::HEAD,
        };

        let mut builder = self.client.request(method, &request.url);
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }

        let mut response = builder.send().await.map_err(|e| HttpError::Request {
            url: request.url.clone(),
            reason: e.to_string(),
        })?;

        let status = response.status().as_u16();
        if request.method == HttpMethod::Head {
            return Ok(HttpResponse::new(status, bytes::Bytes::new()));
        }

        let read_error = |e: reqwest::Error| HttpError::Request {
            url: request.url.clone(),
            reason: format!("failed to read body: {}", e),
        };

        let body = match request.max_body_bytes {
            None => response.bytes().await.map_err(read_error)?,
            Some(limit) => {
                let mut buffer = BytesMut::new();
                while let Some(chunk) = response.chunk().await.map_err(read_error)? {
                    let remaining = limit - buffer.len();
                    if chunk.len() >= remaining {
                        buffer.extend_from_slice(&chunk[..remaining]);
                        break;
                    }
                    buffer.extend_from_slice(&chunk);
                }
                buffer.freeze()
            }
        };

        Ok(HttpResponse { status, body })
    }
}

impl HttpClient for ReqwestHttpClient {
    fn execute<'a>(
        &'a self,
        request: HttpRequest,
        cancel: &'a CancellationToken,
    ) -> BoxFuture<'a, HttpResult<HttpResponse>> {
        Box::pin(async move {
            let timeout = request.timeout;
            tokio::select! {
                biased;
                _ = cancel.cancelled() => Err(HttpError::Cancelled { url: request.url.clone() }),
                result = tokio::time::timeout(timeout, self.perform(&request)) => match result {
                    Ok(response) => response,
                    Err(_) => Err(HttpError::Timeout {
                        url: request.url.clone(),
                        timeout_secs: timeout.as_secs(),
                    }),
                },
            }
        })
    }
}
