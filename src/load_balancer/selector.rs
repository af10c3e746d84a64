//! Health-aware backend selection.
//!
//! # Algorithm
//! ```text
//! draw weighted candidate
//!     → monitoring disabled?          return candidate
//!     → candidate healthy?            return candidate
//!     → first healthy in registry?    return it
//!     → park in RoutingWaitSet until a backend turns healthy, return that one
//! ```
//!
//! Once the candidate is known to be unhealthy the fallback is deterministic
//! (configuration order), trading weighting for availability.

use std::sync::Arc;

use crate::health::store::StatusStore;
use crate::load_balancer::{
    backend::Backend, registry::ServerRegistry, wait_set::RoutingWaitSet,
    weighted::WeightedRandom, LoadBalancer,
};
use crate::observability::events::{EventBus, EventKind};

/// Picks one backend per inbound request.
#[derive(Debug)]
pub struct Selector {
    registry: Arc<ServerRegistry>,
    store: Arc<dyn StatusStore>,
    wait_set: Arc<RoutingWaitSet>,
    events: EventBus,
    strategy: Box<dyn LoadBalancer>,
    health_aware: bool,
}

impl Selector {
    /// Create a selector using weighted-random candidates.
    pub fn new(
        registry: Arc<ServerRegistry>,
        store: Arc<dyn StatusStore>,
        wait_set: Arc<RoutingWaitSet>,
        events: EventBus,
        health_aware: bool,
    ) -> Self {
        Self::with_strategy(
            registry,
            store,
            wait_set,
            events,
            health_aware,
            Box::new(WeightedRandom::new()),
        )
    }

    pub fn with_strategy(
        registry: Arc<ServerRegistry>,
        store: Arc<dyn StatusStore>,
        wait_set: Arc<RoutingWaitSet>,
        events: EventBus,
        health_aware: bool,
        strategy: Box<dyn LoadBalancer>,
    ) -> Self {
        Self {
            registry,
            store,
            wait_set,
            events,
            strategy,
            health_aware,
        }
    }

    pub fn registry(&self) -> &Arc<ServerRegistry> {
        &self.registry
    }

    pub fn is_health_aware(&self) -> bool {
        self.health_aware
    }

    /// Select a backend, suspending while no backend is healthy.
    ///
    /// Never fails. Dropping the future while it is suspended releases its
    /// slot in the wait set.
    pub async fn pick(&self) -> Arc<Backend> {
        let candidate = self.strategy.next_server(self.registry.all());
        if !self.health_aware {
            return candidate.unwrap_or_else(|| self.registry.first().clone());
        }

        let waiter = self.wait_set.register();
        if let Some(backend) = self.resolve(candidate.as_ref()) {
            return backend;
        }

        tracing::debug!(
            pending = self.wait_set.pending() + 1,
            "No healthy backend, waiting for the next healthy signal"
        );
        let index = waiter.next_healthy().await;
        match self.registry.at(index) {
            Some(backend) => backend.clone(),
            None => self.registry.first().clone(),
        }
    }

    /// Health-aware resolution without suspending.
    ///
    /// Returns the candidate when healthy, otherwise the first healthy backend
    /// in registry order, otherwise `None`.
    pub fn resolve(&self, candidate: Option<&Arc<Backend>>) -> Option<Arc<Backend>> {
        if let Some(candidate) = candidate {
            if self.is_healthy(candidate) {
                return Some(candidate.clone());
            }
        }
        self.registry
            .all()
            .iter()
            .filter(|b| candidate.map_or(true, |c| c.id != b.id))
            .find(|b| self.is_healthy(b))
            .cloned()
    }

    /// Whether the stored state is `healthy`. Store failures count as not healthy.
    fn is_healthy(&self, backend: &Backend) -> bool {
        match self.store.get(&backend.id) {
            Ok(record) => record.current.is_healthy(),
            Err(e) => {
                tracing::warn!(backend = %backend.id, error = %e, "Status lookup failed, treating backend as not healthy");
                self.events.publish(EventKind::Error {
                    backend_id: Some(backend.id.clone()),
                    request_id: None,
                    error: e.to_string(),
                });
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ServerConfig;
    use crate::health::state::{HealthRecord, ProbeOutcome};
    use crate::health::store::{MemoryStatusStore, StoreError};
    use std::collections::HashMap;
    use std::time::Duration;

    /// Always proposes the backend at a fixed position.
    #[derive(Debug)]
    struct Fixed(usize);

    impl LoadBalancer for Fixed {
        fn next_server(&self, backends: &[Arc<Backend>]) -> Option<Arc<Backend>> {
            backends.get(self.0).cloned()
        }
    }

    #[derive(Debug)]
    struct BrokenStore;

    impl StatusStore for BrokenStore {
        fn lookup(&self, _: &str) -> Result<Option<HealthRecord>, StoreError> {
            Err(StoreError::Unavailable("connection refused".into()))
        }
        fn set(&self, _: &str, _: &HealthRecord) -> Result<(), StoreError> {
            Err(StoreError::Unavailable("connection refused".into()))
        }
    }

    fn registry() -> Arc<ServerRegistry> {
        let servers: Vec<_> = (1..=4)
            .map(|i| ServerConfig::new(format!("app{i}"), format!("127.0.0.1:{}", 9000 + i), 25))
            .collect();
        Arc::new(ServerRegistry::load(&servers).unwrap())
    }

    fn mark(store: &MemoryStatusStore, id: &str, outcome: ProbeOutcome) {
        let (record, _) = store.get(id).unwrap().observe(outcome);
        store.set(id, &record).unwrap();
    }

    struct Fixture {
        store: Arc<MemoryStatusStore>,
        wait_set: Arc<RoutingWaitSet>,
        events: EventBus,
    }

    impl Fixture {
        fn new() -> Self {
            Self {
                store: Arc::new(MemoryStatusStore::new()),
                wait_set: Arc::new(RoutingWaitSet::new()),
                events: EventBus::default(),
            }
        }

        fn selector(&self, strategy: Box<dyn LoadBalancer>, health_aware: bool) -> Selector {
            Selector::with_strategy(
                registry(),
                self.store.clone(),
                self.wait_set.clone(),
                self.events.clone(),
                health_aware,
                strategy,
            )
        }
    }

    #[tokio::test]
    async fn test_healthy_candidate_returned() {
        let f = Fixture::new();
        for id in ["app1", "app2", "app3", "app4"] {
            mark(&f.store, id, ProbeOutcome::Up);
        }
        let selector = f.selector(Box::new(Fixed(2)), true);
        assert_eq!(selector.pick().await.id, "app3");
    }

    #[tokio::test]
    async fn test_unhealthy_candidate_falls_back_to_first_healthy() {
        let f = Fixture::new();
        mark(&f.store, "app1", ProbeOutcome::Down);
        mark(&f.store, "app2", ProbeOutcome::Up);
        mark(&f.store, "app3", ProbeOutcome::Up);
        mark(&f.store, "app4", ProbeOutcome::Down);

        let selector = f.selector(Box::new(Fixed(3)), true);
        for _ in 0..10 {
            assert_eq!(selector.pick().await.id, "app2");
        }
    }

    #[tokio::test]
    async fn test_unknown_counts_as_not_healthy() {
        let f = Fixture::new();
        mark(&f.store, "app4", ProbeOutcome::Up);
        let selector = f.selector(Box::new(Fixed(0)), true);
        assert_eq!(selector.pick().await.id, "app4");
    }

    #[tokio::test]
    async fn test_monitoring_disabled_ignores_health() {
        let f = Fixture::new();
        mark(&f.store, "app2", ProbeOutcome::Down);
        let selector = f.selector(Box::new(Fixed(1)), false);
        assert_eq!(selector.pick().await.id, "app2");
    }

    #[tokio::test]
    async fn test_all_unhealthy_waiters_resume() {
        let f = Fixture::new();
        for id in ["app1", "app2", "app3", "app4"] {
            mark(&f.store, id, ProbeOutcome::Down);
        }
        let selector = Arc::new(f.selector(Box::new(WeightedRandom::new()), true));

        let waiters: Vec<_> = (0..8)
            .map(|_| {
                let selector = selector.clone();
                tokio::spawn(async move { selector.pick().await })
            })
            .collect();

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(f.wait_set.pending(), 8);
        assert!(waiters.iter().all(|w| !w.is_finished()));

        // What the health monitor does on recovery.
        mark(&f.store, "app3", ProbeOutcome::Up);
        f.wait_set.release(2);

        let picked = tokio::time::timeout(
            Duration::from_secs(1),
            futures_util::future::join_all(waiters),
        )
        .await
        .expect("all waiters must resume");
        for backend in picked {
            assert_eq!(backend.unwrap().id, "app3");
        }
        assert_eq!(f.wait_set.pending(), 0);
    }

    #[tokio::test]
    async fn test_cancelled_pick_leaves_no_waiter() {
        let f = Fixture::new();
        let selector = f.selector(Box::new(WeightedRandom::new()), true);
        let result = tokio::time::timeout(Duration::from_millis(30), selector.pick()).await;
        assert!(result.is_err());
        assert_eq!(f.wait_set.pending(), 0);
    }

    #[tokio::test]
    async fn test_store_failure_treated_as_unhealthy() {
        let wait_set = Arc::new(RoutingWaitSet::new());
        let events = EventBus::default();
        let mut rx = events.subscribe();
        let selector = Selector::with_strategy(
            registry(),
            Arc::new(BrokenStore),
            wait_set.clone(),
            events,
            true,
            Box::new(Fixed(0)),
        );

        assert!(selector.resolve(selector.registry().all().first()).is_none());
        let event = rx.recv().await.unwrap();
        assert_eq!(event.kind.name(), "error");
    }

    #[tokio::test]
    async fn test_pick_frequencies_follow_weights() {
        let f = Fixture::new();
        for id in ["app1", "app2", "app3", "app4"] {
            mark(&f.store, id, ProbeOutcome::Up);
        }
        let selector = f.selector(Box::new(WeightedRandom::new()), true);

        let samples = 20_000;
        let mut counts: HashMap<String, usize> = HashMap::new();
        for _ in 0..samples {
            *counts.entry(selector.pick().await.id.clone()).or_default() += 1;
        }
        for id in ["app1", "app2", "app3", "app4"] {
            let share = counts[id] as f64 / samples as f64;
            assert!((share - 0.25).abs() < 0.03, "{id} share {share}");
        }
    }
}
