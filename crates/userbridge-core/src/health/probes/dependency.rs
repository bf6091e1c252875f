//! Upstream dependency probe

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tracing::warn;

use crate::error::ProbeError;
use crate::health::{HealthComponent, Probe};

/// Lightweight status request against an upstream system
#[async_trait]
pub trait StatusCheck: Send + Sync {
    /// `Ok` when the upstream answered with a success status
    async fn status(&self) -> Result<(), ProbeError>;
}

/// Reports DOWN when the upstream status check fails or times out
#[derive(Clone)]
pub struct DependencyProbe {
    name: String,
    check: Arc<dyn StatusCheck>,
    timeout: Duration,
}

impl DependencyProbe {
    pub fn new(name: impl Into<String>, check: Arc<dyn StatusCheck>, timeout: Duration) -> Self {
        Self {
            name: name.into(),
            check,
            timeout,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

impl std::fmt::Debug for DependencyProbe {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DependencyProbe")
            .field("name", &self.name)
            .field("timeout", &self.timeout)
            .finish()
    }
}

#[async_trait]
impl Probe for DependencyProbe {
    async fn check(&self) -> Result<HealthComponent, ProbeError> {
        let result = match tokio::time::timeout(self.timeout, self.check.status()).await {
            Ok(result) => result,
            Err(_) => Err(ProbeError::Timeout(self.timeout.as_millis() as u64)),
        };

        match result {
            Ok(()) => Ok(HealthComponent::up(format!("{} is reachable", self.name))),
            Err(err) => {
                warn!(dependency = %self.name, error = %err, "Dependency check failed");
                Ok(HealthComponent::down(format!("{} is unreachable: {err}", self.name)))
            }
        }
    }
}
