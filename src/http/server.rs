//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Create Axum Router with the catch-all proxy handler
//! - Wire up middleware (tracing, request ID)
//! - Hand every request to the proxy dispatcher

use axum::{
    body::Body,
    extract::State,
    http::{Request, Response},
    routing::any,
    Router,
};
use tower_http::{
    request_id::{PropagateRequestIdLayer, SetRequestIdLayer},
    trace::TraceLayer,
};

use crate::http::dispatcher::ProxyDispatcher;
use crate::http::request::MakeRequestUuid;

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub dispatcher: ProxyDispatcher,
}

/// Build the proxy router with all middleware layers.
pub fn build_router(dispatcher: ProxyDispatcher) -> Router {
    Router::new()
        .route("/", any(proxy_handler))
        .route("/{*path}", any(proxy_handler))
        .with_state(AppState { dispatcher })
        .layer(PropagateRequestIdLayer::x_request_id())
        .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
        .layer(TraceLayer::new_for_http())
}

/// Main proxy handler.
async fn proxy_handler(State(state): State<AppState>, request: Request<Body>) -> Response<Body> {
    state.dispatcher.dispatch(request).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::time::Duration;

    use axum::http::StatusCode;
    use tower::ServiceExt;

    use crate::config::ServerConfig;
    use crate::health::store::MemoryStatusStore;
    use crate::http::request::X_REQUEST_ID;
    use crate::load_balancer::{RoutingWaitSet, Selector, ServerRegistry};
    use crate::observability::events::EventBus;

    fn router_to_dead_backend() -> Router {
        let registry =
            Arc::new(ServerRegistry::load(&[ServerConfig::new("app1", "127.0.0.1:1", 100)]).unwrap());
        let events = EventBus::default();
        let selector = Arc::new(Selector::new(
            registry,
            Arc::new(MemoryStatusStore::new()),
            Arc::new(RoutingWaitSet::new()),
            events.clone(),
            false,
        ));
        build_router(ProxyDispatcher::new(selector, events, Duration::from_secs(1)))
    }

    #[tokio::test]
    async fn test_request_id_generated_and_echoed() {
        let response = router_to_dead_backend()
            .oneshot(Request::builder().uri("/any/path").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
        assert!(response.headers().contains_key(X_REQUEST_ID));
    }

    #[tokio::test]
    async fn test_client_request_id_kept() {
        let response = router_to_dead_backend()
            .oneshot(
                Request::builder()
                    .uri("/")
                    .header(X_REQUEST_ID, "client-7")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.headers()[X_REQUEST_ID], "client-7");
    }
}
