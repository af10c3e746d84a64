//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Check the backend registry (non-empty, unique ids, weights sum to 100)
//! - Validate value ranges (intervals > 0, probe path absolute)
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: BalancerConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::collections::HashSet;

use thiserror::Error;
use url::Url;

use crate::config::schema::{BalancerConfig, ServerConfig};

/// Total that all backend weights must add up to.
pub const WEIGHT_TOTAL: u32 = 100;

/// A single semantic problem with the configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("server list is empty")]
    NoServers,

    #[error("server id must not be empty")]
    EmptyId,

    #[error("duplicate server id '{0}'")]
    DuplicateId(String),

    #[error("server '{id}' has invalid address '{address}'")]
    InvalidAddress { id: String, address: String },

    #[error("server '{id}' weight {weight} exceeds 100")]
    WeightOutOfRange { id: String, weight: u32 },

    #[error("server weights must sum to 100, got {0}")]
    WeightSum(u32),

    #[error("{0} must be greater than zero")]
    ZeroDuration(&'static str),

    #[error("monitoring path '{0}' must start with '/'")]
    InvalidPath(String),
}

/// Parse a backend address (`host` or `host:port`) into a base URL.
pub fn parse_address(address: &str) -> Option<Url> {
    if address.is_empty() || address.contains('/') {
        return None;
    }
    let url = Url::parse(&format!("http://{}", address)).ok()?;
    url.host_str()?;
    Some(url)
}

/// Check the backend list on its own.
pub fn validate_servers(servers: &[ServerConfig]) -> Vec<ValidationError> {
    let mut errors = Vec::new();
    if servers.is_empty() {
        errors.push(ValidationError::NoServers);
        return errors;
    }

    let mut seen = HashSet::new();
    let mut sum: u32 = 0;
    for server in servers {
        if server.id.is_empty() {
            errors.push(ValidationError::EmptyId);
        } else if !seen.insert(server.id.as_str()) {
            errors.push(ValidationError::DuplicateId(server.id.clone()));
        }
        if parse_address(&server.address).is_none() {
            errors.push(ValidationError::InvalidAddress {
                id: server.id.clone(),
                address: server.address.clone(),
            });
        }
        if server.weight > WEIGHT_TOTAL {
            errors.push(ValidationError::WeightOutOfRange {
                id: server.id.clone(),
                weight: server.weight,
            });
        }
        sum = sum.saturating_add(server.weight);
    }

    if sum != WEIGHT_TOTAL {
        errors.push(ValidationError::WeightSum(sum));
    }
    errors
}

/// Validate a full configuration.
pub fn validate_config(config: &BalancerConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = validate_servers(&config.servers);

    if config.monitoring.enabled {
        if config.monitoring.interval_ms == 0 {
            errors.push(ValidationError::ZeroDuration("monitoring.interval_ms"));
        }
        if config.monitoring.timeout_ms == 0 {
            errors.push(ValidationError::ZeroDuration("monitoring.timeout_ms"));
        }
        if !config.monitoring.path.starts_with('/') {
            errors.push(ValidationError::InvalidPath(config.monitoring.path.clone()));
        }
    }
    if config.timeouts.request_ms == 0 {
        errors.push(ValidationError::ZeroDuration("timeouts.request_ms"));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn servers(weights: &[u32]) -> Vec<ServerConfig> {
        weights
            .iter()
            .enumerate()
            .map(|(i, w)| ServerConfig::new(format!("app{}", i + 1), "127.0.0.1", *w))
            .collect()
    }

    #[test]
    fn test_weights_must_sum_to_hundred() {
        assert!(validate_servers(&servers(&[25, 25, 25, 25])).is_empty());
        assert_eq!(
            validate_servers(&servers(&[25, 25, 25, 24])),
            vec![ValidationError::WeightSum(99)]
        );
    }

    #[test]
    fn test_empty_registry_rejected() {
        assert_eq!(validate_servers(&[]), vec![ValidationError::NoServers]);
    }

    #[test]
    fn test_collects_all_errors() {
        let list = vec![
            ServerConfig::new("a", "127.0.0.1:80", 50),
            ServerConfig::new("a", "not a host/path", 50),
        ];
        let errors = validate_servers(&list);
        assert!(errors.contains(&ValidationError::DuplicateId("a".into())));
        assert!(errors
            .iter()
            .any(|e| matches!(e, ValidationError::InvalidAddress { .. })));
        assert_eq!(errors.len(), 2);
    }

    #[test]
    fn test_parse_address_default_port() {
        let url = parse_address("10.0.0.1").unwrap();
        assert_eq!(url.port_or_known_default(), Some(80));
        let url = parse_address("backend.local:8080").unwrap();
        assert_eq!(url.port(), Some(8080));
        assert!(parse_address("").is_none());
    }

    #[test]
    fn test_monitoring_ranges_checked_only_when_enabled() {
        let mut config = BalancerConfig::builder()
            .server("a", "127.0.0.1", 100)
            .monitoring_interval_ms(0)
            .monitoring_path("health")
            .build();
        let errors = validate_config(&config).unwrap_err();
        assert_eq!(errors.len(), 2);

        config.monitoring.enabled = false;
        assert!(validate_config(&config).is_ok());
    }
}
