use std::net::SocketAddr;
use std::sync::Arc;

use axum::Router;
use tokio::net::TcpListener;

use patchline::http::{HttpClient, ReqwestHttpClient};

/// Serve `app` on an ephemeral port and return its base URL.
pub async fn start_server(app: Router) -> (String, tokio::task::JoinHandle<()>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr: SocketAddr = listener.local_addr().unwrap();
    let handle = tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    (format!("http://{}", addr), handle)
}

pub fn http() -> Arc<dyn HttpClient> {
    Arc::new(ReqwestHttpClient::new().unwrap())
}
