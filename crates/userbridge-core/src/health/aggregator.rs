//! Health aggregation over a set of named probes

use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures::future::join_all;
use futures::FutureExt;
use indexmap::IndexMap;
use tracing::{error, warn};

use crate::health::{HealthComponent, HealthResponse, Probe};

/// Runs registered probes and reduces them into one [`HealthResponse`]
#[derive(Clone, Default)]
pub struct HealthAggregator {
    probes: Vec<(String, Arc<dyn Probe>)>,
}

impl std::fmt::Debug for HealthAggregator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HealthAggregator")
            .field("probes", &self.names())
            .finish()
    }
}

impl HealthAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a probe under a component name
    pub fn with_probe(mut self, name: impl Into<String>, probe: Arc<dyn Probe>) -> Self {
        self.probes.push((name.into(), probe));
        self
    }

    pub fn names(&self) -> Vec<&str> {
        self.probes.iter().map(|(name, _)| name.as_str()).collect()
    }

    /// Aggregate every registered probe
    pub async fn check_all(&self) -> HealthResponse {
        aggregate(&self.probes).await
    }

    /// Aggregate only the named probe; `None` when nothing is registered under it
    pub async fn check_one(&self, name: &str) -> Option<HealthResponse> {
        let selected: Vec<_> = self
            .probes
            .iter()
            .filter(|(probe_name, _)| probe_name == name)
            .cloned()
            .collect();

        if selected.is_empty() {
            return None;
        }
        Some(aggregate(&selected).await)
    }
}

/// Run each probe independently and combine the results.
///
/// A probe that errors or panics is reported as `DOWN` with a diagnostic and
/// never prevents the other probes from being evaluated. Components keep the
/// order the probes were given in; when two probes share a name the later
/// result wins and keeps the first one's position.
pub async fn aggregate(probes: &[(String, Arc<dyn Probe>)]) -> HealthResponse {
    let checks = probes.iter().map(|(name, probe)| async move {
        let result = AssertUnwindSafe(probe.check()).catch_unwind().await;
        let component = match result {
            Ok(Ok(component)) => component,
            Ok(Err(err)) => {
                warn!(probe = %name, error = %err, "Health probe failed");
                HealthComponent::down(format!("Failed to check {name} health: {err}"))
            }
            Err(panic) => {
                let reason = panic_message(panic.as_ref());
                error!(probe = %name, reason = %reason, "Health probe panicked");
                HealthComponent::down(format!("Failed to check {name} health: {reason}"))
            }
        };
        (name.clone(), component)
    });

    let components: IndexMap<_, _> = join_all(checks).await.into_iter().collect();
    HealthResponse::from_components(components)
}

fn panic_message(panic: &(dyn std::any::Any + Send)) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.clone()
    } else {
        "probe panicked".to_string()
    }
}
