//! The balancer: owns every subsystem and their lifecycle.
//!
//! ```text
//! Balancer::new(config)        validate, load registry, open status store
//!     → subscribe()            observe BalancerEvents
//!     → serve(listener, sd)    start monitor, hold cold-start gate, proxy traffic
//!     → sd.trigger()           monitor and listeners stop, in-flight requests drain
//! ```
//!
//! With monitoring enabled no request is proxied before the first healthy
//! or recovery signal: the listener is bound but connections are not
//! accepted until then.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tokio::net::TcpListener;
use tokio::sync::broadcast;

use crate::admin::{setup_admin_router, AdminState};
use crate::config::{validate_config, BalancerConfig, ConfigError};
use crate::health::active::HealthMonitor;
use crate::health::store::{build_store, StatusStore, StoreError};
use crate::http::{build_router, ProxyDispatcher};
use crate::lifecycle::Shutdown;
use crate::load_balancer::{RoutingWaitSet, Selector, ServerRegistry};
use crate::observability::events::{BalancerEvent, EventBus, EventKind};

/// Top-level error for constructing and running a balancer.
#[derive(Debug, Error)]
pub enum BalancerError {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub struct Balancer {
    config: BalancerConfig,
    registry: Arc<ServerRegistry>,
    store: Arc<dyn StatusStore>,
    wait_set: Arc<RoutingWaitSet>,
    events: EventBus,
    selector: Arc<Selector>,
}

impl Balancer {
    /// Validate the configuration and open the configured status store.
    pub fn new(config: BalancerConfig) -> Result<Self, BalancerError> {
        validate_config(&config).map_err(ConfigError::Validation)?;
        let store = build_store(&config.store)?;
        Self::with_store(config, store)
    }

    /// Like [`Balancer::new`] with a caller-provided status store.
    pub fn with_store(
        config: BalancerConfig,
        store: Arc<dyn StatusStore>,
    ) -> Result<Self, BalancerError> {
        validate_config(&config).map_err(ConfigError::Validation)?;
        let registry = Arc::new(ServerRegistry::load(&config.servers)?);
        let wait_set = Arc::new(RoutingWaitSet::new());
        let events = EventBus::default();
        let selector = Arc::new(Selector::new(
            registry.clone(),
            store.clone(),
            wait_set.clone(),
            events.clone(),
            config.monitoring.enabled,
        ));

        tracing::info!(
            backends = registry.len(),
            monitoring = config.monitoring.enabled,
            store = ?config.store.kind,
            "Balancer initialized"
        );

        Ok(Self {
            config,
            registry,
            store,
            wait_set,
            events,
            selector,
        })
    }

    pub fn config(&self) -> &BalancerConfig {
        &self.config
    }

    pub fn registry(&self) -> Arc<ServerRegistry> {
        self.registry.clone()
    }

    pub fn store(&self) -> Arc<dyn StatusStore> {
        self.store.clone()
    }

    pub fn selector(&self) -> Arc<Selector> {
        self.selector.clone()
    }

    pub fn wait_set(&self) -> Arc<RoutingWaitSet> {
        self.wait_set.clone()
    }

    /// Observe balancer events. Subscribe before `serve` to see startup.
    pub fn subscribe(&self) -> broadcast::Receiver<BalancerEvent> {
        self.events.subscribe()
    }

    pub fn health_monitor(&self) -> HealthMonitor {
        HealthMonitor::new(
            self.registry.clone(),
            self.store.clone(),
            self.wait_set.clone(),
            self.events.clone(),
            self.config.monitoring.clone(),
        )
    }

    pub fn dispatcher(&self) -> ProxyDispatcher {
        ProxyDispatcher::new(
            self.selector.clone(),
            self.events.clone(),
            Duration::from_millis(self.config.timeouts.request_ms),
        )
    }

    pub fn admin_router(&self) -> axum::Router {
        setup_admin_router(AdminState {
            registry: self.registry.clone(),
            store: self.store.clone(),
            wait_set: self.wait_set.clone(),
            monitoring: self.config.monitoring.enabled,
            api_key: Arc::from(self.config.admin.api_key.as_str()),
        })
    }

    /// Bind `0.0.0.0:port` and serve until shutdown.
    pub async fn listen(self, port: u16, shutdown: Shutdown) -> Result<(), BalancerError> {
        let listener = TcpListener::bind(SocketAddr::from(([0, 0, 0, 0], port))).await?;
        self.serve(listener, shutdown).await
    }

    /// Serve proxy traffic on `listener` until `shutdown` fires.
    pub async fn serve(self, listener: TcpListener, shutdown: Shutdown) -> Result<(), BalancerError> {
        let addr = listener.local_addr()?;
        let mut gate_shutdown = shutdown.subscribe();
        let mut serve_shutdown = shutdown.subscribe();

        if self.config.monitoring.enabled {
            let monitor = Arc::new(self.health_monitor());
            tokio::spawn(monitor.run(shutdown.subscribe()));
        }

        if self.config.admin.enabled {
            self.spawn_admin(&shutdown).await?;
        }

        if self.config.monitoring.enabled && !self.wait_set.is_ready() {
            tracing::info!(address = %addr, "Waiting for the first healthy backend");
            tokio::select! {
                _ = self.wait_set.ready() => {}
                _ = gate_shutdown.recv() => {
                    tracing::info!("Shutdown before any backend became healthy");
                    return Ok(());
                }
            }
        }

        self.events.publish(EventKind::Started);
        tracing::info!(address = %addr, "HTTP server starting");

        let app = build_router(self.dispatcher());
        axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                let _ = serve_shutdown.recv().await;
            })
            .await?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }

    async fn spawn_admin(&self, shutdown: &Shutdown) -> Result<(), BalancerError> {
        let listener = TcpListener::bind(&self.config.admin.bind_address).await?;
        tracing::info!(address = %listener.local_addr()?, "Admin API listening");

        let app = self.admin_router();
        let mut admin_shutdown = shutdown.subscribe();
        tokio::spawn(async move {
            let served = axum::serve(listener, app)
                .with_graceful_shutdown(async move {
                    let _ = admin_shutdown.recv().await;
                })
                .await;
            if let Err(e) = served {
                tracing::error!(error = %e, "Admin API stopped");
            }
        });
        Ok(())
    }
}
