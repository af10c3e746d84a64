//! Active health checking.
//!
//! # Responsibilities
//! - Periodically probe backends
//! - Advance each backend's health record and persist it
//! - Publish healthy / unhealthy / recovery and monitoring events
//! - Release requests parked for a healthy backend

use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::http::{Method, Request, StatusCode};
use hyper_util::{
    client::legacy::{connect::HttpConnector, Client},
    rt::TokioExecutor,
};
use thiserror::Error;
use tokio::sync::{broadcast, Mutex};
use tokio::task;
use tokio::time::{self, MissedTickBehavior};

use crate::config::{MonitoringConfig, ProbeStrategy};
use crate::health::state::{HealthRecord, ProbeOutcome, Transition};
use crate::health::store::{StatusStore, StoreError};
use crate::load_balancer::{Backend, RoutingWaitSet, ServerRegistry};
use crate::observability::events::{EventBus, EventKind};
use crate::observability::metrics;

/// Why a probe did not get an answer.
#[derive(Debug, Error)]
pub enum ProbeError {
    #[error("failed to build probe request: {0}")]
    Request(String),

    #[error("probe failed: {0}")]
    Transport(String),

    #[error("probe timed out after {0}ms")]
    Timeout(u64),
}

/// Minimal liveness request against one backend.
#[derive(Clone)]
pub struct HttpProbe {
    client: Client<HttpConnector, Body>,
    path: String,
    timeout: Duration,
}

impl HttpProbe {
    pub fn new(path: impl Into<String>, timeout: Duration) -> Self {
        let mut connector = HttpConnector::new();
        connector.set_connect_timeout(Some(timeout));
        let client = Client::builder(TokioExecutor::new()).build(connector);
        Self {
            client,
            path: path.into(),
            timeout,
        }
    }

    /// Send `HEAD <path>`. Any HTTP response means the backend is up.
    pub async fn check(&self, backend: &Backend) -> Result<StatusCode, ProbeError> {
        let request = Request::builder()
            .method(Method::HEAD)
            .uri(backend.url_for(&self.path))
            .header("user-agent", "weighted-balancer-health-check")
            .body(Body::empty())
            .map_err(|e| ProbeError::Request(e.to_string()))?;

        match time::timeout(self.timeout, self.client.request(request)).await {
            Ok(Ok(response)) => Ok(response.status()),
            Ok(Err(e)) => Err(ProbeError::Transport(e.to_string())),
            Err(_) => Err(ProbeError::Timeout(self.timeout.as_millis() as u64)),
        }
    }
}

pub struct HealthMonitor {
    registry: Arc<ServerRegistry>,
    store: Arc<dyn StatusStore>,
    wait_set: Arc<RoutingWaitSet>,
    events: EventBus,
    config: MonitoringConfig,
    probe: HttpProbe,
    /// One lock per backend, serializing read-modify-write of its record.
    record_locks: Vec<Mutex<()>>,
}

impl HealthMonitor {
    pub fn new(
        registry: Arc<ServerRegistry>,
        store: Arc<dyn StatusStore>,
        wait_set: Arc<RoutingWaitSet>,
        events: EventBus,
        config: MonitoringConfig,
    ) -> Self {
        let probe = HttpProbe::new(
            config.path.clone(),
            Duration::from_millis(config.timeout_ms),
        );
        let record_locks = (0..registry.len()).map(|_| Mutex::new(())).collect();
        Self {
            registry,
            store,
            wait_set,
            events,
            config,
            probe,
            record_locks,
        }
    }

    /// Tick until shutdown. Probes run as their own tasks so a slow backend
    /// never delays the next tick.
    pub async fn run(self: Arc<Self>, mut shutdown: broadcast::Receiver<()>) {
        if !self.config.enabled {
            tracing::info!("Health monitoring disabled");
            return;
        }

        tracing::info!(
            interval_ms = self.config.interval_ms,
            timeout_ms = self.config.timeout_ms,
            path = %self.config.path,
            strategy = ?self.config.strategy,
            "Health monitor starting"
        );

        let mut ticker = time::interval(Duration::from_millis(self.config.interval_ms));
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    for index in self.targets() {
                        let monitor = self.clone();
                        tokio::spawn(async move {
                            monitor.check_server(index).await;
                        });
                    }
                }
                _ = shutdown.recv() => {
                    tracing::info!("Health monitor received shutdown signal, exiting loop");
                    break;
                }
            }
        }
    }

    /// Registry indices to probe this tick.
    fn targets(&self) -> Vec<usize> {
        let len = self.registry.len();
        match self.config.strategy {
            // A random target makes the first backend found healthy again
            // after a mass failure random too.
            ProbeStrategy::Random => vec![fastrand::usize(..len)],
            ProbeStrategy::All => (0..len).collect(),
        }
    }

    /// Probe one backend and record the result.
    pub async fn check_server(&self, index: usize) -> Option<Transition> {
        let backend = self.registry.at(index)?.clone();
        let result = self.probe.check(&backend).await;
        match &result {
            Ok(status) => tracing::trace!(backend = %backend.id, status = %status, "Probe answered"),
            Err(e) => tracing::debug!(backend = %backend.id, error = %e, "Probe failed"),
        }
        self.record(index, result.map(|_| ())).await
    }

    /// Advance the backend's record with a probe result, persist it and notify.
    pub async fn record(
        &self,
        index: usize,
        result: Result<(), ProbeError>,
    ) -> Option<Transition> {
        let backend = self.registry.at(index)?;
        let _guard = self.record_locks.get(index)?.lock().await;

        let prior = match self.store.lookup(&backend.id) {
            Ok(Some(record)) => record,
            Ok(None) => {
                let fresh = HealthRecord::unknown(&backend.id);
                if let Err(e) = self.write_record(&backend.id, fresh).await {
                    self.store_failed(backend, e);
                }
                HealthRecord::unknown(&backend.id)
            }
            Err(e) => {
                self.store_failed(backend, e);
                HealthRecord::unknown(&backend.id)
            }
        };

        let outcome = if result.is_ok() {
            ProbeOutcome::Up
        } else {
            ProbeOutcome::Down
        };
        let (record, transition) = prior.observe(outcome);

        if let Err(e) = self.write_record(&backend.id, record.clone()).await {
            self.store_failed(backend, e);
        }

        if record.changed() {
            tracing::info!(
                backend = %backend.id,
                from = %record.previous,
                to = %record.current,
                transition = %transition,
                "Backend health changed"
            );
        }
        metrics::record_probe(&backend.id, transition.as_str());
        metrics::record_backend_health(&backend.id, record.current.is_healthy());

        let backend_id = backend.id.clone();
        self.events.publish(match transition {
            Transition::Healthy => EventKind::Healthy { backend_id },
            Transition::Recovery => EventKind::Recovery { backend_id },
            Transition::Unhealthy => EventKind::Unhealthy {
                backend_id,
                error: result.err().map(|e| e.to_string()),
            },
        });
        // Waiters resume only after the healthy signal is observable.
        if transition.releases_waiters() {
            self.wait_set.release(index);
        }
        self.events.publish(EventKind::Monitoring { record });

        Some(transition)
    }

    /// Store writes may hit the filesystem, so they run on the blocking pool.
    async fn write_record(&self, backend_id: &str, record: HealthRecord) -> Result<(), StoreError> {
        let store = self.store.clone();
        let backend_id = backend_id.to_string();
        task::spawn_blocking(move || store.set(&backend_id, &record))
            .await
            .map_err(|e| StoreError::Unavailable(e.to_string()))?
    }

    fn store_failed(&self, backend: &Backend, error: StoreError) {
        tracing::warn!(backend = %backend.id, error = %error, "Status store failure");
        self.events.publish(EventKind::Error {
            backend_id: Some(backend.id.clone()),
            request_id: None,
            error: error.to_string(),
        });
    }
}
