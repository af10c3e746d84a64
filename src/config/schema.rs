//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the balancer.
//! All types derive Serde traits for deserialization from config files.

use serde::{Deserialize, Serialize};

/// Root configuration for the load balancer.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct BalancerConfig {
    /// Listener configuration (bind address).
    pub listener: ListenerConfig,

    /// Backend server definitions, in selection order.
    pub servers: Vec<ServerConfig>,

    /// Health monitoring settings.
    pub monitoring: MonitoringConfig,

    /// Timeout configuration.
    pub timeouts: TimeoutConfig,

    /// Where backend health records are kept.
    pub store: StoreConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,

    #[serde(default)]
    pub admin: AdminConfig,
}

impl BalancerConfig {
    /// Start a builder seeded with defaults.
    pub fn builder() -> BalancerConfigBuilder {
        BalancerConfigBuilder::default()
    }
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:3000").
    pub bind_address: String,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:3000".to_string(),
        }
    }
}

/// A single backend entry.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    /// Unique backend identifier.
    pub id: String,

    /// Backend address, `host` or `host:port` (port defaults to 80).
    pub address: String,

    /// Selection weight, 0..=100. All weights must sum to 100.
    pub weight: u32,
}

impl ServerConfig {
    pub fn new(id: impl Into<String>, address: impl Into<String>, weight: u32) -> Self {
        Self {
            id: id.into(),
            address: address.into(),
            weight,
        }
    }
}

/// Which backends the monitor probes on each tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ProbeStrategy {
    /// One backend chosen uniformly at random per tick.
    #[default]
    Random,
    /// Every backend once per tick.
    All,
}

/// Health monitoring configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct MonitoringConfig {
    /// Enable the health monitor and health-aware selection.
    pub enabled: bool,

    /// Tick period in milliseconds.
    pub interval_ms: u64,

    /// Per-probe timeout in milliseconds.
    pub timeout_ms: u64,

    /// Path requested by probes.
    pub path: String,

    /// Probe target policy.
    pub strategy: ProbeStrategy,
}

impl Default for MonitoringConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            interval_ms: 1000,
            timeout_ms: 500,
            path: "/".to_string(),
            strategy: ProbeStrategy::Random,
        }
    }
}

/// Timeout configuration for proxied requests.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Upstream request timeout (send + full response body) in milliseconds.
    pub request_ms: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self { request_ms: 30_000 }
    }
}

/// Backing store for health records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum StoreKind {
    /// In-process map, lost on restart.
    #[default]
    Memory,
    /// JSON file, reloaded on start.
    File,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct StoreConfig {
    pub kind: StoreKind,

    /// File path for `kind = "file"`.
    pub path: String,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            kind: StoreKind::Memory,
            path: "server-status.json".to_string(),
        }
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error). `RUST_LOG` wins if set.
    pub log_level: String,

    /// Log output format.
    pub log_format: LogFormat,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_format: LogFormat::Pretty,
            metrics_enabled: false,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}

/// Admin API configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct AdminConfig {
    /// Enable admin API.
    pub enabled: bool,

    /// API key for authentication (Bearer token).
    pub api_key: String,

    /// Admin API bind address.
    pub bind_address: String,
}

impl Default for AdminConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            // WARNING: This is a placeholder! Change this in production.
            api_key: "CHANGE_ME_IN_PRODUCTION".to_string(),
            bind_address: "127.0.0.1:8081".to_string(),
        }
    }
}

/// Builder for programmatic configuration.
///
/// ```
/// use weighted_balancer::config::BalancerConfig;
///
/// let config = BalancerConfig::builder()
///     .server("app1", "127.0.0.1:8001", 50)
///     .server("app2", "127.0.0.1:8002", 50)
///     .monitoring_interval_ms(250)
///     .build();
/// assert_eq!(config.servers.len(), 2);
/// ```
#[derive(Debug, Clone, Default)]
pub struct BalancerConfigBuilder {
    config: BalancerConfig,
}

impl BalancerConfigBuilder {
    pub fn bind_address(mut self, addr: impl Into<String>) -> Self {
        self.config.listener.bind_address = addr.into();
        self
    }

    pub fn server(mut self, id: impl Into<String>, address: impl Into<String>, weight: u32) -> Self {
        self.config.servers.push(ServerConfig::new(id, address, weight));
        self
    }

    pub fn monitoring(mut self, enabled: bool) -> Self {
        self.config.monitoring.enabled = enabled;
        self
    }

    pub fn monitoring_interval_ms(mut self, ms: u64) -> Self {
        self.config.monitoring.interval_ms = ms;
        self
    }

    pub fn monitoring_timeout_ms(mut self, ms: u64) -> Self {
        self.config.monitoring.timeout_ms = ms;
        self
    }

    pub fn monitoring_path(mut self, path: impl Into<String>) -> Self {
        self.config.monitoring.path = path.into();
        self
    }

    pub fn probe_strategy(mut self, strategy: ProbeStrategy) -> Self {
        self.config.monitoring.strategy = strategy;
        self
    }

    pub fn request_timeout_ms(mut self, ms: u64) -> Self {
        self.config.timeouts.request_ms = ms;
        self
    }

    pub fn file_store(mut self, path: impl Into<String>) -> Self {
        self.config.store = StoreConfig {
            kind: StoreKind::File,
            path: path.into(),
        };
        self
    }

    pub fn build(self) -> BalancerConfig {
        self.config
    }
}
