//!
//! Userbridge Core - resilient upstream calls and health aggregation
//!
//! The executor wraps every call to the data platform in validation, circuit
//! breaking and retry-with-backoff; the health module combines host and
//! dependency probes into one report.

/// Error module
pub mod error;

/// Health module
pub mod health;

/// Outcome module
pub mod outcome;

/// Resilience module
pub mod resilience;

/// Validation module
pub mod validation;

// Re-export key types
pub use error::{
    ConfigError, ConfigResult, ProbeError, RemoteError, TransportError, TransportErrorKind,
    ValidationError,
};
pub use health::probes::ProbeConfig;
pub use health::{HealthAggregator, HealthComponent, HealthResponse, HealthStatus, Probe, ProbeThreshold};
pub use outcome::{CallOutcome, ClassifiedFailure, FailureCategory, UpstreamDetail};
pub use resilience::{
    CircuitBreaker, CircuitBreakerConfig, CircuitState, ResilienceConfig, ResilientExecutor,
    RetryPolicy,
};
pub use validation::{RawUserId, Trusted, UserId, ValidateInput};
