//! Backend abstraction.
//!
//! # Responsibilities
//! - Represent a single configured backend server
//! - Resolve its address into a base URL and request authority
//!
//! Health lives in the status store, not here: a `Backend` never changes
//! after the registry is loaded.

use std::fmt;

use url::Url;

use crate::config::validation::{parse_address, ValidationError};

/// A single backend server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Backend {
    /// Unique backend identifier.
    pub id: String,
    /// Address as configured (`host` or `host:port`).
    pub address: String,
    /// Selection weight out of 100.
    pub weight: u32,
    /// Pre-calculated base URL for performance.
    pub base_url: Url,
}

impl Backend {
    /// Create a new backend, parsing its address.
    pub fn new(
        id: impl Into<String>,
        address: impl Into<String>,
        weight: u32,
    ) -> Result<Self, ValidationError> {
        let id = id.into();
        let address = address.into();
        let base_url = parse_address(&address).ok_or_else(|| ValidationError::InvalidAddress {
            id: id.clone(),
            address: address.clone(),
        })?;
        Ok(Self {
            id,
            address,
            weight,
            base_url,
        })
    }

    /// `host:port` with the port defaulted to 80.
    pub fn authority(&self) -> String {
        let host = self.base_url.host_str().unwrap_or_default();
        let port = self.base_url.port_or_known_default().unwrap_or(80);
        format!("{}:{}", host, port)
    }

    /// Absolute URL for a path (and optional query) on this backend.
    pub fn url_for(&self, path_and_query: &str) -> String {
        if path_and_query.starts_with('/') {
            format!("http://{}{}", self.authority(), path_and_query)
        } else {
            format!("http://{}/{}", self.authority(), path_and_query)
        }
    }
}

impl fmt::Display for Backend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.id, self.address)
    }
}
