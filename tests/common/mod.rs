//! Shared utilities for integration and load testing.

#![allow(dead_code)]

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::http::StatusCode;
use axum::routing::any;
use axum::Router;
use tokio::io::AsyncReadExt;
use tokio::net::TcpListener;
use tokio::sync::broadcast;

use weighted_balancer::{BalancerEvent, EventKind};

/// A local address nobody is listening on (yet).
pub async fn free_addr() -> SocketAddr {
    TcpListener::bind("127.0.0.1:0")
        .await
        .unwrap()
        .local_addr()
        .unwrap()
}

/// Start a backend answering every request with `200` and a fixed body.
pub async fn start_mock_backend_at(addr: SocketAddr, response: &'static str) {
    let listener = TcpListener::bind(addr).await.unwrap();
    let app = Router::new()
        .route("/", any(move || async move { response }))
        .route("/{*path}", any(move || async move { response }));
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });
}

/// Start a backend on a fresh port; returns its address.
pub async fn start_mock_backend(response: &'static str) -> SocketAddr {
    let addr = free_addr().await;
    start_mock_backend_at(addr, response).await;
    addr
}

/// Start a programmable mock backend with async support.
pub async fn start_programmable_backend<F, Fut>(f: F) -> SocketAddr
where
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = (u16, String)> + Send + 'static,
{
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let f = Arc::new(f);
    let handler = move || {
        let f = f.clone();
        async move {
            let (status, body) = f().await;
            (
                StatusCode::from_u16(status).unwrap_or(StatusCode::OK),
                body,
            )
        }
    };
    let app = Router::new()
        .route("/", any(handler.clone()))
        .route("/{*path}", any(handler));
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });
    addr
}

/// Start a backend that reads the request and closes the connection
/// without answering.
pub async fn start_hangup_backend() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        while let Ok((mut socket, _)) = listener.accept().await {
            tokio::spawn(async move {
                let mut buf = [0u8; 4096];
                let _ = socket.read(&mut buf).await;
                drop(socket);
            });
        }
    });
    addr
}

/// A client that never reuses connections, so each request is dispatched anew.
pub fn client() -> reqwest::Client {
    reqwest::Client::builder()
        .pool_max_idle_per_host(0)
        .no_proxy()
        .timeout(Duration::from_secs(5))
        .build()
        .unwrap()
}

/// Receive events until one matches `name`, returning everything seen.
pub async fn events_until(
    rx: &mut broadcast::Receiver<BalancerEvent>,
    name: &str,
    within: Duration,
) -> Vec<EventKind> {
    let mut seen = Vec::new();
    tokio::time::timeout(within, async {
        loop {
            match rx.recv().await {
                Ok(event) => {
                    let done = event.kind.name() == name;
                    seen.push(event.kind);
                    if done {
                        break;
                    }
                }
                Err(broadcast::error::RecvError::Lagged(_)) => continue,
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
    })
    .await
    .unwrap_or_else(|_| panic!("no '{name}' event within {within:?}"));
    seen
}
