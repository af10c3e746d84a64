//! Health checking subsystem.
//!
//! # Data Flow
//! ```text
//! Active health checks (active.rs):
//!     Periodic timer
//!     → Probe one random backend (or all, per strategy)
//!     → Advance state.rs record
//!     → Persist in store.rs
//!     → Publish healthy / unhealthy / recovery + monitoring events
//!     → Release requests waiting for a healthy backend
//!
//! State machine (state.rs):
//!     Unknown → Healthy | Unhealthy
//!     Healthy ←→ Unhealthy   (Unhealthy → Healthy labelled Recovery)
//! ```
//!
//! # Design Decisions
//! - A single probe decides the state; no hysteresis
//! - Proxied request failures do not change health, only probes do
//! - Health state is per-backend and lives in the status store

pub mod active;
pub mod state;
pub mod store;

pub use active::{HealthMonitor, HttpProbe, ProbeError};
pub use state::{HealthRecord, HealthState, ProbeOutcome, Transition};
pub use store::{build_store, FileStatusStore, MemoryStatusStore, StatusStore, StoreError};
