//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! All subsystems produce:
//!     → events.rs (typed balancer notifications, broadcast)
//!     → logging.rs (structured log events)
//!     → metrics.rs (counters, gauges, histograms)
//!
//! Consumers:
//!     → Event observers (embedding application, event logger)
//!     → Log aggregation (stdout)
//!     → Metrics endpoint (Prometheus scrape)
//! ```
//!
//! # Design Decisions
//! - Structured logging (JSON) for machine parsing
//! - Request ID flows through request, selection and response events
//! - Metrics are cheap (atomic increments)

pub mod events;
pub mod logging;
pub mod metrics;

pub use events::{BalancerEvent, EventBus, EventKind};
