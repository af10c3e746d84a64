//! Weighted reverse-proxy load balancer library.
//!
//! Distributes inbound HTTP requests across a fixed set of backends by
//! weighted random choice, steering around backends the health monitor has
//! found unhealthy and holding requests while no backend is healthy.

pub mod admin;
pub mod balancer;
pub mod config;
pub mod health;
pub mod http;
pub mod lifecycle;
pub mod load_balancer;
pub mod observability;

pub use balancer::{Balancer, BalancerError};
pub use config::schema::BalancerConfig;
pub use lifecycle::Shutdown;
pub use observability::events::{BalancerEvent, EventKind};
