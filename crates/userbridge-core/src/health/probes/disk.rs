//! Disk utilization probe

use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use sysinfo::Disks;
use tracing::warn;

use crate::error::ProbeError;
use crate::health::{HealthComponent, Probe, ProbeThreshold};

/// Space figures for one volume
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DiskSample {
    pub total_bytes: u64,
    pub available_bytes: u64,
}

impl DiskSample {
    /// Used share of the volume in percent, rounded to one decimal
    pub fn usage_percent(&self) -> f32 {
        if self.total_bytes == 0 {
            return 0.0;
        }
        let used = self.total_bytes.saturating_sub(self.available_bytes);
        let percent = used as f64 / self.total_bytes as f64 * 100.0;
        ((percent * 10.0).round() / 10.0) as f32
    }
}

/// Source of disk measurements
#[async_trait]
pub trait DiskSampler: Send + Sync {
    async fn sample(&self) -> Result<DiskSample, ProbeError>;
}

/// Reads the volume mounted at a path through `sysinfo`
#[derive(Debug, Clone)]
pub struct SystemDiskSampler {
    mount_point: PathBuf,
}

impl SystemDiskSampler {
    pub fn new(mount_point: impl Into<PathBuf>) -> Self {
        Self {
            mount_point: mount_point.into(),
        }
    }

    pub fn mount_point(&self) -> &Path {
        &self.mount_point
    }
}

impl Default for SystemDiskSampler {
    fn default() -> Self {
        Self::new("/")
    }
}

#[async_trait]
impl DiskSampler for SystemDiskSampler {
    async fn sample(&self) -> Result<DiskSample, ProbeError> {
        let mount_point = self.mount_point.clone();

        tokio::task::spawn_blocking(move || {
            let disks = Disks::new_with_refreshed_list();
            disks
                .iter()
                .find(|d| d.mount_point() == mount_point.as_path())
                .map(|d| DiskSample {
                    total_bytes: d.total_space(),
                    available_bytes: d.available_space(),
                })
                .ok_or_else(|| {
                    ProbeError::Sampling(format!("no volume mounted at {}", mount_point.display()))
                })
        })
        .await
        .map_err(|e| ProbeError::Sampling(e.to_string()))?
    }
}

/// Reports DOWN when disk utilization reaches the threshold
#[derive(Clone)]
pub struct DiskProbe {
    sampler: Arc<dyn DiskSampler>,
    threshold: ProbeThreshold,
}

impl DiskProbe {
    pub fn new(sampler: Arc<dyn DiskSampler>, threshold: ProbeThreshold) -> Self {
        Self { sampler, threshold }
    }

    pub fn threshold(&self) -> ProbeThreshold {
        self.threshold
    }
}

impl std::fmt::Debug for DiskProbe {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DiskProbe")
            .field("threshold", &self.threshold)
            .finish()
    }
}

#[async_trait]
impl Probe for DiskProbe {
    async fn check(&self) -> Result<HealthComponent, ProbeError> {
        let sample = self.sampler.sample().await?;
        let usage = sample.usage_percent();

        if usage >= self.threshold.value() {
            warn!(usage_percent = usage, threshold = self.threshold.value(), "Disk usage critical");
            Ok(HealthComponent::down(format!("Disk usage is critical: {usage:.1}% used.")))
        } else {
            Ok(HealthComponent::up(format!("Disk usage is healthy: {usage:.1}% used.")))
        }
    }
}
