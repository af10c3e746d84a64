use axum::{extract::State, Json};
use serde::Serialize;

use crate::admin::AdminState;
use crate::health::state::{HealthRecord, HealthState};

#[derive(Debug, Serialize)]
pub struct SystemStatus {
    pub version: &'static str,
    pub monitoring: bool,
    /// A backend has been reported healthy at least once.
    pub ready: bool,
    pub waiting_requests: usize,
}

#[derive(Debug, Serialize)]
pub struct BackendStatus {
    pub id: String,
    pub address: String,
    pub weight: u32,
    pub previous: HealthState,
    pub current: HealthState,
    /// Set when the status store could not be read.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

pub async fn get_status(State(state): State<AdminState>) -> Json<SystemStatus> {
    Json(SystemStatus {
        version: env!("CARGO_PKG_VERSION"),
        monitoring: state.monitoring,
        ready: state.wait_set.is_ready(),
        waiting_requests: state.wait_set.pending(),
    })
}

pub async fn get_backends(State(state): State<AdminState>) -> Json<Vec<BackendStatus>> {
    let statuses = state
        .registry
        .all()
        .iter()
        .map(|b| {
            let (record, error) = match state.store.get(&b.id) {
                Ok(record) => (record, None),
                Err(e) => (HealthRecord::unknown(&b.id), Some(e.to_string())),
            };
            BackendStatus {
                id: b.id.clone(),
                address: b.address.clone(),
                weight: b.weight,
                previous: record.previous,
                current: record.current,
                error,
            }
        })
        .collect();

    Json(statuses)
}
