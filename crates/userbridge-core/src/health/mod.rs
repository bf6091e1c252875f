//! Health model: components, probes and aggregated responses

use std::fmt;

use async_trait::async_trait;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::error::ProbeError;

pub mod aggregator;
pub mod probes;

pub use aggregator::HealthAggregator;

/// Binary health status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum HealthStatus {
    Up,
    Down,
}

impl HealthStatus {
    pub fn is_up(self) -> bool {
        self == HealthStatus::Up
    }
}

impl fmt::Display for HealthStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HealthStatus::Up => write!(f, "UP"),
            HealthStatus::Down => write!(f, "DOWN"),
        }
    }
}

/// Result of one probe evaluation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthComponent {
    pub status: HealthStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

impl HealthComponent {
    pub fn up(details: impl Into<String>) -> Self {
        Self {
            status: HealthStatus::Up,
            details: Some(details.into()),
        }
    }

    pub fn down(details: impl Into<String>) -> Self {
        Self {
            status: HealthStatus::Down,
            details: Some(details.into()),
        }
    }
}

/// Overall status plus every component by name, in probe registration order
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: HealthStatus,
    pub components: IndexMap<String, HealthComponent>,
}

impl HealthResponse {
    /// `DOWN` if any component is down, otherwise `UP`
    pub fn from_components(components: IndexMap<String, HealthComponent>) -> Self {
        let status = if components.values().all(|c| c.status.is_up()) {
            HealthStatus::Up
        } else {
            HealthStatus::Down
        };
        Self { status, components }
    }

    pub fn component(&self, name: &str) -> Option<&HealthComponent> {
        self.components.get(name)
    }
}

/// A unit health check for one resource or dependency
#[async_trait]
pub trait Probe: Send + Sync {
    /// Evaluate the probe. Errors are reported as a `DOWN` component by the
    /// aggregator.
    async fn check(&self) -> Result<HealthComponent, ProbeError>;
}

/// Validated threshold percentage in `0..=100`
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd)]
pub struct ProbeThreshold(f32);

impl ProbeThreshold {
    pub fn new(value: f32) -> Result<Self, ProbeError> {
        if value.is_finite() && (0.0..=100.0).contains(&value) {
            Ok(Self(value))
        } else {
            Err(ProbeError::InvalidThreshold(value))
        }
    }

    pub fn value(self) -> f32 {
        self.0
    }
}

impl fmt::Display for ProbeThreshold {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}%", self.0)
    }
}
