//! Concrete health probes

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ProbeError;
use crate::health::ProbeThreshold;

pub mod cpu;
pub mod dependency;
pub mod disk;

pub use cpu::{CpuProbe, CpuSample, CpuSampler, SystemCpuSampler};
pub use dependency::{DependencyProbe, StatusCheck};
pub use disk::{DiskProbe, DiskSample, DiskSampler, SystemDiskSampler};

/// Probe thresholds and sampling settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProbeConfig {
    /// CPU utilization above which the host is reported DOWN
    #[serde(default = "default_cpu_threshold")]
    pub cpu_threshold_percent: f32,

    /// Disk utilization at or above which the volume is reported DOWN
    #[serde(default = "default_disk_threshold")]
    pub disk_threshold_percent: f32,

    /// CPU sampling window in milliseconds
    #[serde(default = "default_cpu_sample_ms")]
    pub cpu_sample_ms: u64,

    /// Mount point of the volume checked by the disk probe
    #[serde(default = "default_disk_mount_point")]
    pub disk_mount_point: PathBuf,

    /// Timeout for the dependency status request in milliseconds
    #[serde(default = "default_dependency_timeout_ms")]
    pub dependency_timeout_ms: u64,
}

fn default_cpu_threshold() -> f32 { 85.0 }
fn default_disk_threshold() -> f32 { 90.0 }
fn default_cpu_sample_ms() -> u64 { 1_000 }
fn default_disk_mount_point() -> PathBuf { PathBuf::from("/") }
fn default_dependency_timeout_ms() -> u64 { 5_000 }

impl Default for ProbeConfig {
    fn default() -> Self {
        Self {
            cpu_threshold_percent: default_cpu_threshold(),
            disk_threshold_percent: default_disk_threshold(),
            cpu_sample_ms: default_cpu_sample_ms(),
            disk_mount_point: default_disk_mount_point(),
            dependency_timeout_ms: default_dependency_timeout_ms(),
        }
    }
}

impl ProbeConfig {
    /// CPU probe sampling the local host
    pub fn cpu_probe(&self) -> Result<CpuProbe, ProbeError> {
        let sampler = SystemCpuSampler::new(Duration::from_millis(self.cpu_sample_ms));
        Ok(CpuProbe::new(
            Arc::new(sampler),
            ProbeThreshold::new(self.cpu_threshold_percent)?,
        ))
    }

    /// Disk probe for the configured mount point
    pub fn disk_probe(&self) -> Result<DiskProbe, ProbeError> {
        let sampler = SystemDiskSampler::new(self.disk_mount_point.clone());
        Ok(DiskProbe::new(
            Arc::new(sampler),
            ProbeThreshold::new(self.disk_threshold_percent)?,
        ))
    }

    /// Dependency probe around an upstream status check
    pub fn dependency_probe(
        &self,
        name: impl Into<String>,
        check: Arc<dyn StatusCheck>,
    ) -> DependencyProbe {
        DependencyProbe::new(name, check, Duration::from_millis(self.dependency_timeout_ms))
    }
}
