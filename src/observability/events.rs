//! Balancer notifications.
//!
//! # Responsibilities
//! - Define the typed lifecycle and health events published by the balancer
//! - Fan them out to any number of observers
//! - Mirror them into the structured log
//!
//! # Design Decisions
//! - `tokio::sync::broadcast`: publishers never block, slow observers lag
//!   and are told how many events they missed
//! - Publishing with no observers is not an error

use std::time::{SystemTime, UNIX_EPOCH};

use serde::Serialize;
use tokio::sync::broadcast;

use crate::health::state::HealthRecord;

/// Default capacity of the event channel.
pub const DEFAULT_EVENT_CAPACITY: usize = 1024;

/// A notification with the time it was raised.
#[derive(Debug, Clone, Serialize)]
pub struct BalancerEvent {
    /// Milliseconds since the Unix epoch.
    pub timestamp_ms: u64,
    #[serde(flatten)]
    pub kind: EventKind,
}

impl BalancerEvent {
    pub fn now(kind: EventKind) -> Self {
        let timestamp_ms = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_millis() as u64;
        Self { timestamp_ms, kind }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "camelCase")]
pub enum EventKind {
    /// Proxy traffic is being accepted.
    Started,

    /// An inbound request was received.
    Request {
        request_id: String,
        method: String,
        path: String,
    },

    /// A backend was chosen for a request.
    SelectingServer {
        request_id: String,
        backend_id: String,
    },

    /// A response was relayed to the client.
    Response {
        request_id: String,
        backend_id: String,
        status: u16,
        bytes: usize,
        latency_ms: u64,
    },

    /// A probe completed; carries the stored record.
    Monitoring { record: HealthRecord },

    Healthy { backend_id: String },

    Unhealthy {
        backend_id: String,
        error: Option<String>,
    },

    Recovery { backend_id: String },

    Error {
        backend_id: Option<String>,
        request_id: Option<String>,
        error: String,
    },
}

impl EventKind {
    pub fn name(&self) -> &'static str {
        match self {
            EventKind::Started => "started",
            EventKind::Request { .. } => "request",
            EventKind::SelectingServer { .. } => "selectingServer",
            EventKind::Response { .. } => "response",
            EventKind::Monitoring { .. } => "monitoring",
            EventKind::Healthy { .. } => "healthy",
            EventKind::Unhealthy { .. } => "unhealthy",
            EventKind::Recovery { .. } => "recovery",
            EventKind::Error { .. } => "error",
        }
    }

    pub fn backend_id(&self) -> Option<&str> {
        match self {
            EventKind::SelectingServer { backend_id, .. }
            | EventKind::Response { backend_id, .. }
            | EventKind::Healthy { backend_id }
            | EventKind::Unhealthy { backend_id, .. }
            | EventKind::Recovery { backend_id } => Some(backend_id.as_str()),
            EventKind::Monitoring { record } => Some(record.backend_id.as_str()),
            EventKind::Error { backend_id, .. } => backend_id.as_deref(),
            EventKind::Started | EventKind::Request { .. } => None,
        }
    }
}

/// Publish/subscribe hub for [`BalancerEvent`]s.
#[derive(Debug, Clone)]
pub struct EventBus {
    tx: broadcast::Sender<BalancerEvent>,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<BalancerEvent> {
        self.tx.subscribe()
    }

    pub fn publish(&self, kind: EventKind) {
        // No observers is fine.
        let _ = self.tx.send(BalancerEvent::now(kind));
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(DEFAULT_EVENT_CAPACITY)
    }
}

/// Write every event to the log until the bus is dropped.
pub async fn log_events(mut rx: broadcast::Receiver<BalancerEvent>) {
    loop {
        match rx.recv().await {
            Ok(event) => log_event(&event),
            Err(broadcast::error::RecvError::Lagged(missed)) => {
                tracing::warn!(missed, "Event logger lagging, events dropped");
            }
            Err(broadcast::error::RecvError::Closed) => break,
        }
    }
}

fn log_event(event: &BalancerEvent) {
    let at = event.timestamp_ms;
    match &event.kind {
        EventKind::Started => tracing::info!(at, "Balancer accepting proxy traffic"),
        EventKind::Healthy { backend_id } => {
            tracing::debug!(at, backend = %backend_id, "healthy")
        }
        EventKind::Recovery { backend_id } => {
            tracing::info!(at, backend = %backend_id, "recovery")
        }
        EventKind::Unhealthy { backend_id, error } => tracing::warn!(
            at,
            backend = %backend_id,
            error = error.as_deref().unwrap_or("-"),
            "unhealthy"
        ),
        EventKind::Error {
            backend_id,
            request_id,
            error,
        } => tracing::error!(
            at,
            backend = backend_id.as_deref().unwrap_or("-"),
            request_id = request_id.as_deref().unwrap_or("-"),
            error = %error,
            "error"
        ),
        other => tracing::trace!(at, event = other.name(), payload = ?other, "event"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_all_subscribers_receive() {
        let bus = EventBus::default();
        let mut a = bus.subscribe();
        let mut b = bus.subscribe();
        bus.publish(EventKind::Recovery {
            backend_id: "app1".into(),
        });
        for rx in [&mut a, &mut b] {
            let event = rx.recv().await.unwrap();
            assert_eq!(event.kind.name(), "recovery");
            assert_eq!(event.kind.backend_id(), Some("app1"));
            assert!(event.timestamp_ms > 0);
        }
    }

    #[test]
    fn test_publish_without_subscribers() {
        EventBus::new(4).publish(EventKind::Started);
    }

    #[test]
    fn test_event_json_shape() {
        let event = BalancerEvent {
            timestamp_ms: 7,
            kind: EventKind::Unhealthy {
                backend_id: "app2".into(),
                error: Some("connection refused".into()),
            },
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["event"], "unhealthy");
        assert_eq!(json["backend_id"], "app2");
        assert_eq!(json["timestamp_ms"], 7);
    }
}
