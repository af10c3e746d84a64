//! Admin API: read-only view of balancer and backend health.

pub mod auth;
pub mod handlers;

use std::sync::Arc;

use axum::{middleware, routing::get, Router};

use crate::health::store::StatusStore;
use crate::load_balancer::{RoutingWaitSet, ServerRegistry};

use self::auth::admin_auth_middleware;
use self::handlers::*;

/// State shared by admin handlers.
#[derive(Clone)]
pub struct AdminState {
    pub registry: Arc<ServerRegistry>,
    pub store: Arc<dyn StatusStore>,
    pub wait_set: Arc<RoutingWaitSet>,
    pub monitoring: bool,
    pub api_key: Arc<str>,
}

pub fn setup_admin_router(state: AdminState) -> Router {
    Router::new()
        .route("/admin/status", get(get_status))
        .route("/admin/backends", get(get_backends))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            admin_auth_middleware,
        ))
        .with_state(state)
}
