//! CPU utilization probe

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use sysinfo::System;
use tracing::warn;

use crate::error::ProbeError;
use crate::health::{HealthComponent, Probe, ProbeThreshold};

/// One CPU measurement
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CpuSample {
    /// Utilization across all cores, 0-100
    pub usage_percent: f32,
    pub logical_cpus: usize,
    /// 1, 5 and 15 minute load averages
    pub load_average: [f64; 3],
}

impl CpuSample {
    fn load_average_text(&self) -> String {
        let [one, five, fifteen] = self.load_average;
        format!("({one:.2}, {five:.2}, {fifteen:.2})")
    }
}

/// Source of CPU measurements
#[async_trait]
pub trait CpuSampler: Send + Sync {
    async fn sample(&self) -> Result<CpuSample, ProbeError>;
}

/// Samples the local host through `sysinfo`
#[derive(Debug, Clone)]
pub struct SystemCpuSampler {
    window: Duration,
}

impl SystemCpuSampler {
    /// The window is raised to the minimum interval `sysinfo` needs between
    /// two refreshes to compute usage.
    pub fn new(window: Duration) -> Self {
        Self {
            window: window.max(sysinfo::MINIMUM_CPU_UPDATE_INTERVAL),
        }
    }

    pub fn window(&self) -> Duration {
        self.window
    }
}

impl Default for SystemCpuSampler {
    fn default() -> Self {
        Self::new(Duration::from_secs(1))
    }
}

#[async_trait]
impl CpuSampler for SystemCpuSampler {
    async fn sample(&self) -> Result<CpuSample, ProbeError> {
        let mut sys = System::new();
        sys.refresh_cpu_all();
        tokio::time::sleep(self.window).await;
        sys.refresh_cpu_all();

        let logical_cpus = sys.cpus().len();
        if logical_cpus == 0 {
            return Err(ProbeError::Sampling("no CPUs reported by the host".to_string()));
        }

        let load = System::load_average();
        Ok(CpuSample {
            usage_percent: sys.global_cpu_usage(),
            logical_cpus,
            load_average: [load.one, load.five, load.fifteen],
        })
    }
}

/// Reports DOWN when CPU utilization is strictly above the threshold
#[derive(Clone)]
pub struct CpuProbe {
    sampler: Arc<dyn CpuSampler>,
    threshold: ProbeThreshold,
}

impl CpuProbe {
    pub fn new(sampler: Arc<dyn CpuSampler>, threshold: ProbeThreshold) -> Self {
        Self { sampler, threshold }
    }

    pub fn threshold(&self) -> ProbeThreshold {
        self.threshold
    }
}

impl std::fmt::Debug for CpuProbe {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CpuProbe")
            .field("threshold", &self.threshold)
            .finish()
    }
}

#[async_trait]
impl Probe for CpuProbe {
    async fn check(&self) -> Result<HealthComponent, ProbeError> {
        let sample = self.sampler.sample().await?;
        let load = sample.load_average_text();

        if sample.usage_percent > self.threshold.value() {
            warn!(
                usage_percent = sample.usage_percent,
                threshold = self.threshold.value(),
                "High CPU usage"
            );
            Ok(HealthComponent::down(format!(
                "High CPU usage detected: {:.1}%. Load average (1m, 5m, 15m): {load}",
                sample.usage_percent
            )))
        } else {
            Ok(HealthComponent::up(format!(
                "CPU usage at {:.1}%. Load average (1m, 5m, 15m): {load}. Logical CPUs: {}",
                sample.usage_percent, sample.logical_cpus
            )))
        }
    }
}
