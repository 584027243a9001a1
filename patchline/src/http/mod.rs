//! HTTP transport abstraction.
//!
//! Every source and the discovery prober talk to the network through the
//! [`HttpClient`] trait. Requests carry their own timeout and are raced
//! against the caller's [`CancellationToken`](tokio_util::sync::CancellationToken),
//! so cancelling a caller always aborts its in-flight requests.
//!
//! Tests inject [`MockHttpClient`] instead of the reqwest-backed client.

mod client;
mod types;

pub use client::{HttpClient, ReqwestHttpClient, DEFAULT_USER_AGENT};
pub use types::{HttpError, HttpMethod, HttpRequest, HttpResponse, HttpResult};

#[cfg(test)]
pub use client::tests::MockHttpClient;
