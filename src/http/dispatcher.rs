//! Proxy dispatch.
//!
//! # Responsibilities
//! - Ask the selector for a backend (may wait for one to become healthy)
//! - Forward method, path, query, headers and body to it
//! - Relay status, headers and full body back to the client
//! - Report request / selectingServer / response / error events
//!
//! # Design Decisions
//! - No automatic retry on another backend; an upstream failure is answered
//!   with 502 (or 504 on timeout) and reported once
//! - Upstream failures do not touch the stored health; only probes do

use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::body::{Body, Bytes};
use axum::http::{response, Request, Response, StatusCode, Uri};
use axum::response::IntoResponse;
use hyper::header::{self, HeaderMap};
use hyper_util::{
    client::legacy::{connect::HttpConnector, Client},
    rt::TokioExecutor,
};
use thiserror::Error;
use tokio::time;

use crate::http::request::request_id;
use crate::load_balancer::{Backend, Selector};
use crate::observability::events::{EventBus, EventKind};
use crate::observability::metrics;

/// Drop connection-scoped headers that must not cross the proxy.
fn strip_hop_by_hop(headers: &mut HeaderMap) {
    for name in [
        header::CONNECTION,
        header::PROXY_AUTHENTICATE,
        header::PROXY_AUTHORIZATION,
        header::TE,
        header::TRAILER,
        header::TRANSFER_ENCODING,
        header::UPGRADE,
    ] {
        headers.remove(name);
    }
    headers.remove("keep-alive");
}

/// Failure of a proxied request.
#[derive(Debug, Error)]
pub enum ProxyError {
    #[error("invalid upstream request: {0}")]
    Request(String),

    #[error("upstream request failed: {0}")]
    Upstream(String),

    #[error("failed to read upstream body: {0}")]
    Body(String),

    #[error("upstream timed out after {0}ms")]
    Timeout(u64),
}

impl ProxyError {
    /// Status returned to the client.
    pub fn status_code(&self) -> StatusCode {
        match self {
            ProxyError::Request(_) => StatusCode::INTERNAL_SERVER_ERROR,
            ProxyError::Timeout(_) => StatusCode::GATEWAY_TIMEOUT,
            ProxyError::Upstream(_) | ProxyError::Body(_) => StatusCode::BAD_GATEWAY,
        }
    }
}

/// Forwards inbound requests to the selected backend.
#[derive(Clone)]
pub struct ProxyDispatcher {
    selector: Arc<Selector>,
    client: Client<HttpConnector, Body>,
    events: EventBus,
    request_timeout: Duration,
}

impl ProxyDispatcher {
    pub fn new(selector: Arc<Selector>, events: EventBus, request_timeout: Duration) -> Self {
        let client = Client::builder(TokioExecutor::new()).build(HttpConnector::new());
        Self {
            selector,
            client,
            events,
            request_timeout,
        }
    }

    /// Proxy one request. Always produces a response.
    pub async fn dispatch(&self, request: Request<Body>) -> Response<Body> {
        let start = Instant::now();
        let request_id = request_id(&request);
        let method = request.method().to_string();

        self.events.publish(EventKind::Request {
            request_id: request_id.clone(),
            method: method.clone(),
            path: request.uri().path().to_string(),
        });

        let backend = self.selector.pick().await;
        self.events.publish(EventKind::SelectingServer {
            request_id: request_id.clone(),
            backend_id: backend.id.clone(),
        });

        tracing::debug!(
            request_id = %request_id,
            method = %method,
            backend = %backend.id,
            "Proxying request"
        );

        match self.forward(&backend, request).await {
            Ok((parts, body)) => {
                let status = parts.status;
                metrics::record_request(&method, status.as_u16(), &backend.id, start);
                self.events.publish(EventKind::Response {
                    request_id,
                    backend_id: backend.id.clone(),
                    status: status.as_u16(),
                    bytes: body.len(),
                    latency_ms: start.elapsed().as_millis() as u64,
                });
                Response::from_parts(parts, Body::from(body))
            }
            Err(e) => {
                let status = e.status_code();
                tracing::error!(
                    request_id = %request_id,
                    backend = %backend.id,
                    error = %e,
                    "Upstream error"
                );
                metrics::record_request(&method, status.as_u16(), &backend.id, start);
                self.events.publish(EventKind::Error {
                    backend_id: Some(backend.id.clone()),
                    request_id: Some(request_id),
                    error: e.to_string(),
                });
                (status, "Upstream request failed").into_response()
            }
        }
    }

    /// Send the request to `backend` and buffer the full response.
    async fn forward(
        &self,
        backend: &Backend,
        request: Request<Body>,
    ) -> Result<(response::Parts, Bytes), ProxyError> {
        let (parts, body) = request.into_parts();

        let path_and_query = parts
            .uri
            .path_and_query()
            .map(|pq| pq.as_str())
            .unwrap_or("/");
        let uri: Uri = backend
            .url_for(path_and_query)
            .parse()
            .map_err(|e: axum::http::uri::InvalidUri| ProxyError::Request(e.to_string()))?;

        let mut builder = Request::builder().method(parts.method).uri(uri);
        if let Some(headers) = builder.headers_mut() {
            *headers = parts.headers;
            strip_hop_by_hop(headers);
        }
        let outbound = builder
            .body(body)
            .map_err(|e| ProxyError::Request(e.to_string()))?;

        let exchange = async {
            let response = self
                .client
                .request(outbound)
                .await
                .map_err(|e| ProxyError::Upstream(e.to_string()))?;
            let (mut parts, body) = response.into_parts();
            strip_hop_by_hop(&mut parts.headers);
            let bytes = axum::body::to_bytes(Body::new(body), usize::MAX)
                .await
                .map_err(|e| ProxyError::Body(e.to_string()))?;
            Ok::<_, ProxyError>((parts, bytes))
        };

        time::timeout(self.request_timeout, exchange)
            .await
            .map_err(|_| ProxyError::Timeout(self.request_timeout.as_millis() as u64))?
    }
}
