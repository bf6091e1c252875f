//! Resilience module for userbridge
//! Retry-with-backoff and circuit breaking around upstream calls.

use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ConfigResult;

pub mod circuit_breaker;
pub mod executor;
pub mod retry;

pub use circuit_breaker::{
    CallPermit, CircuitBreaker, CircuitBreakerConfig, CircuitOpen, CircuitSnapshot, CircuitState,
};
pub use executor::ResilientExecutor;
pub use retry::{default_is_retryable, RetryPolicy, RetryPolicyBuilder};

/// Serializable resilience settings for one upstream
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResilienceConfig {
    /// Maximum attempts per call, including the first
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Delay after the first failed attempt in milliseconds
    #[serde(default = "default_base_delay_ms")]
    pub base_delay_ms: u64,

    /// Backoff factor applied per attempt (exponential)
    #[serde(default = "default_backoff_multiplier")]
    pub backoff_multiplier: f64,

    /// Maximum backoff duration in milliseconds
    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,

    /// Per-attempt timeout in milliseconds
    #[serde(default)]
    pub attempt_timeout_ms: Option<u64>,

    /// Overall per-call deadline in milliseconds
    #[serde(default)]
    pub call_deadline_ms: Option<u64>,

    /// Circuit breaker failure threshold
    #[serde(default = "default_circuit_threshold")]
    pub circuit_threshold: u32,

    /// Circuit breaker reset timeout in milliseconds
    #[serde(default = "default_circuit_reset_ms")]
    pub circuit_reset_ms: u64,
}

// Default values
fn default_max_attempts() -> u32 { 3 }
fn default_base_delay_ms() -> u64 { 200 }
fn default_backoff_multiplier() -> f64 { 2.0 }
fn default_max_delay_ms() -> u64 { 5_000 }
fn default_circuit_threshold() -> u32 { 5 }
fn default_circuit_reset_ms() -> u64 { 30_000 }

impl Default for ResilienceConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            base_delay_ms: default_base_delay_ms(),
            backoff_multiplier: default_backoff_multiplier(),
            max_delay_ms: default_max_delay_ms(),
            attempt_timeout_ms: None,
            call_deadline_ms: None,
            circuit_threshold: default_circuit_threshold(),
            circuit_reset_ms: default_circuit_reset_ms(),
        }
    }
}

impl ResilienceConfig {
    /// Validated retry policy with the default retry predicate
    pub fn retry_policy(&self) -> ConfigResult<RetryPolicy> {
        let mut builder = RetryPolicy::builder()
            .max_attempts(self.max_attempts)
            .base_delay(Duration::from_millis(self.base_delay_ms))
            .multiplier(self.backoff_multiplier)
            .max_delay(Duration::from_millis(self.max_delay_ms));

        if let Some(ms) = self.attempt_timeout_ms {
            builder = builder.attempt_timeout(Duration::from_millis(ms));
        }
        if let Some(ms) = self.call_deadline_ms {
            builder = builder.call_deadline(Duration::from_millis(ms));
        }

        builder.build()
    }

    pub fn circuit_breaker_config(&self) -> CircuitBreakerConfig {
        CircuitBreakerConfig {
            failure_threshold: self.circuit_threshold,
            reset_timeout: Duration::from_millis(self.circuit_reset_ms),
        }
    }

    /// Build an executor with its own breaker named after the upstream
    pub fn build_executor(&self, upstream: &str) -> ConfigResult<ResilientExecutor> {
        let breaker = CircuitBreaker::new(upstream, self.circuit_breaker_config())?;
        Ok(ResilientExecutor::new(self.retry_policy()?, Arc::new(breaker)))
    }
}
