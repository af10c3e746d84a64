//! Backend health state machine.
//!
//! # States
//! - Unknown: never probed
//! - Healthy: backend receives traffic
//! - Unhealthy: backend excluded from load balancing
//!
//! # State Transitions
//! ```text
//! Unknown   → Healthy | Unhealthy   (first probe)
//! Healthy   → Unhealthy             (probe failed)
//! Unhealthy → Healthy               (probe succeeded, labelled Recovery)
//! ```
//!
//! Every probe produces a transition label, even when the state does not
//! change. `Recovery` is only a label; the stored state is `Healthy`.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Persisted health state of a backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum HealthState {
    #[default]
    Unknown,
    Healthy,
    Unhealthy,
}

impl HealthState {
    pub fn as_str(&self) -> &'static str {
        match self {
            HealthState::Unknown => "unknown",
            HealthState::Healthy => "healthy",
            HealthState::Unhealthy => "unhealthy",
        }
    }

    pub fn is_healthy(&self) -> bool {
        matches!(self, HealthState::Healthy)
    }
}

impl fmt::Display for HealthState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of one liveness probe.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProbeOutcome {
    /// The backend answered.
    Up,
    /// Connection refused, timeout or transport error.
    Down,
}

impl ProbeOutcome {
    fn state(self) -> HealthState {
        match self {
            ProbeOutcome::Up => HealthState::Healthy,
            ProbeOutcome::Down => HealthState::Unhealthy,
        }
    }
}

/// Notification label computed for each probe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Transition {
    Healthy,
    Unhealthy,
    /// Healthy again after having been unhealthy.
    Recovery,
}

impl Transition {
    pub fn as_str(&self) -> &'static str {
        match self {
            Transition::Healthy => "healthy",
            Transition::Unhealthy => "unhealthy",
            Transition::Recovery => "recovery",
        }
    }

    /// Whether requests parked for a healthy backend may proceed.
    pub fn releases_waiters(&self) -> bool {
        matches!(self, Transition::Healthy | Transition::Recovery)
    }
}

impl fmt::Display for Transition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The last two health states of a backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthRecord {
    pub backend_id: String,
    /// `current` as it was before the last probe.
    pub previous: HealthState,
    pub current: HealthState,
}

impl HealthRecord {
    /// The record of a backend that has never been probed.
    pub fn unknown(backend_id: impl Into<String>) -> Self {
        Self {
            backend_id: backend_id.into(),
            previous: HealthState::Unknown,
            current: HealthState::Unknown,
        }
    }

    /// Apply a probe outcome, returning the next record and its label.
    pub fn observe(&self, outcome: ProbeOutcome) -> (HealthRecord, Transition) {
        let transition = match outcome {
            ProbeOutcome::Up if self.current == HealthState::Unhealthy => Transition::Recovery,
            ProbeOutcome::Up => Transition::Healthy,
            ProbeOutcome::Down => Transition::Unhealthy,
        };
        let next = HealthRecord {
            backend_id: self.backend_id.clone(),
            previous: self.current,
            current: outcome.state(),
        };
        (next, transition)
    }

    /// True if the last probe changed the state.
    pub fn changed(&self) -> bool {
        self.previous != self.current
    }
}
