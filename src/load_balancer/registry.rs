//! Backend registry.
//!
//! # Responsibilities
//! - Validate and freeze the configured backend set
//! - Expose backends in configuration order (the canonical selection order)

use std::sync::Arc;

use crate::config::loader::ConfigError;
use crate::config::schema::ServerConfig;
use crate::config::validation::validate_servers;
use crate::load_balancer::backend::Backend;

/// Immutable, ordered set of backends. Never empty.
#[derive(Debug)]
pub struct ServerRegistry {
    backends: Vec<Arc<Backend>>,
}

impl ServerRegistry {
    /// Build the registry from configuration.
    ///
    /// Fails if the list is empty, ids repeat, an address does not parse, or
    /// the weights do not sum to exactly 100.
    pub fn load(servers: &[ServerConfig]) -> Result<Self, ConfigError> {
        let errors = validate_servers(servers);
        if !errors.is_empty() {
            return Err(ConfigError::Validation(errors));
        }

        let backends = servers
            .iter()
            .map(|s| Backend::new(&s.id, &s.address, s.weight).map(Arc::new))
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| ConfigError::Validation(vec![e]))?;

        tracing::debug!(backend_count = backends.len(), "Server registry loaded");
        Ok(Self { backends })
    }

    /// All backends in configuration order.
    pub fn all(&self) -> &[Arc<Backend>] {
        &self.backends
    }

    /// First backend in configuration order.
    pub fn first(&self) -> &Arc<Backend> {
        // load() rejects empty lists
        &self.backends[0]
    }

    pub fn at(&self, index: usize) -> Option<&Arc<Backend>> {
        self.backends.get(index)
    }

    pub fn get(&self, id: &str) -> Option<&Arc<Backend>> {
        self.backends.iter().find(|b| b.id == id)
    }

    pub fn index_of(&self, id: &str) -> Option<usize> {
        self.backends.iter().position(|b| b.id == id)
    }

    pub fn len(&self) -> usize {
        self.backends.len()
    }

    pub fn is_empty(&self) -> bool {
        self.backends.is_empty()
    }
}
