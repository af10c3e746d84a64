//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Startup (crate::balancer):
//!     Load config → Validate registry → Start monitor → Cold-start gate → Serve
//!
//! Shutdown (shutdown.rs):
//!     Signal received → Stop monitor → Stop accepting → Drain connections → Exit
//!
//! Signals (signals.rs):
//!     SIGTERM/SIGINT → Trigger graceful shutdown
//! ```

pub mod shutdown;
pub mod signals;

pub use shutdown::Shutdown;
