//! Metrics collection and exposition.
//!
//! # Responsibilities
//! - Define balancer metrics (requests, latency, backend health, waiters)
//! - Expose Prometheus-compatible metrics endpoint
//! - Track per-backend and aggregate metrics
//!
//! # Metrics
//! - `balancer_requests_total` (counter): proxied requests by method, status, backend
//! - `balancer_request_duration_seconds` (histogram): latency distribution
//! - `balancer_probes_total` (counter): probes by backend and transition label
//! - `balancer_backend_health` (gauge): 1=healthy, 0=unhealthy
//! - `balancer_waiting_requests` (gauge): requests parked for a healthy backend
//!
//! Without an installed recorder every call is a no-op.

use std::net::SocketAddr;
use std::time::Instant;

use metrics_exporter_prometheus::PrometheusBuilder;

/// Install the Prometheus recorder and its HTTP scrape listener.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics endpoint listening"),
        Err(e) => tracing::error!(error = %e, "Failed to install metrics exporter"),
    }
}

pub fn record_request(method: &str, status: u16, backend: &str, start: Instant) {
    metrics::counter!(
        "balancer_requests_total",
        "method" => method.to_string(),
        "status" => status.to_string(),
        "backend" => backend.to_string()
    )
    .increment(1);
    metrics::histogram!(
        "balancer_request_duration_seconds",
        "backend" => backend.to_string()
    )
    .record(start.elapsed().as_secs_f64());
}

pub fn record_probe(backend: &str, transition: &'static str) {
    metrics::counter!(
        "balancer_probes_total",
        "backend" => backend.to_string(),
        "transition" => transition
    )
    .increment(1);
}

pub fn record_backend_health(backend: &str, healthy: bool) {
    metrics::gauge!("balancer_backend_health", "backend" => backend.to_string())
        .set(if healthy { 1.0 } else { 0.0 });
}

pub fn record_waiting_requests(count: usize) {
    metrics::gauge!("balancer_waiting_requests").set(count as f64);
}
