//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML)  or  BalancerConfig::builder()
//!     → loader.rs (parse & deserialize)
//!     → validation.rs (semantic checks)
//!     → BalancerConfig (validated, immutable)
//!     → shared by value / Arc with all subsystems
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded; the backend registry never changes at runtime
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks
//! - Servers are a TOML array so their order is the selection order

pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::{load_config, parse_config, ConfigError};
pub use schema::{
    AdminConfig, BalancerConfig, BalancerConfigBuilder, ListenerConfig, LogFormat,
    MonitoringConfig, ObservabilityConfig, ProbeStrategy, ServerConfig, StoreConfig, StoreKind,
    TimeoutConfig,
};
pub use validation::{validate_config, validate_servers, ValidationError, WEIGHT_TOTAL};
