//! Load balancing subsystem.
//!
//! # Data Flow
//! ```text
//! Inbound request
//!     → selector.rs (health-aware pick)
//!         → weighted.rs (weighted-random candidate over registry.rs order)
//!         → status store (is the candidate healthy?)
//!         → wait_set.rs (park until a backend turns healthy)
//!     → backend.rs (address of the chosen server)
//! ```
//!
//! # Design Decisions
//! - Registry is immutable after load; no locking on the hot path
//! - Health lives in the status store, written only by the health monitor
//! - Unhealthy backends excluded from selection
//! - Waiting requests are released all at once, never one by one

pub mod backend;
pub mod registry;
pub mod selector;
pub mod wait_set;
pub mod weighted;

use std::fmt;
use std::sync::Arc;

pub use backend::Backend;
pub use registry::ServerRegistry;
pub use selector::Selector;
pub use wait_set::RoutingWaitSet;
pub use weighted::WeightedRandom;

/// A strategy proposing a candidate backend from an ordered list.
pub trait LoadBalancer: Send + Sync + fmt::Debug {
    fn next_server(&self, backends: &[Arc<Backend>]) -> Option<Arc<Backend>>;
}
