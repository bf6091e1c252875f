//! Retry policy with bounded exponential backoff

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use crate::error::{ConfigError, ConfigResult, TransportError, TransportErrorKind};

type RetryPredicate = Arc<dyn Fn(&TransportError) -> bool + Send + Sync>;

/// Immutable retry configuration shared by every call through an executor
#[derive(Clone)]
pub struct RetryPolicy {
    max_attempts: u32,
    base_delay: Duration,
    multiplier: f64,
    max_delay: Duration,
    attempt_timeout: Option<Duration>,
    call_deadline: Option<Duration>,
    is_retryable: RetryPredicate,
}

impl fmt::Debug for RetryPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RetryPolicy")
            .field("max_attempts", &self.max_attempts)
            .field("base_delay", &self.base_delay)
            .field("multiplier", &self.multiplier)
            .field("max_delay", &self.max_delay)
            .field("attempt_timeout", &self.attempt_timeout)
            .field("call_deadline", &self.call_deadline)
            .finish_non_exhaustive()
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_millis(200),
            multiplier: 2.0,
            max_delay: Duration::from_secs(5),
            attempt_timeout: None,
            call_deadline: None,
            is_retryable: Arc::new(default_is_retryable),
        }
    }
}

/// Connection, timeout, gateway and I/O failures are worth another attempt;
/// undecodable responses are not.
pub fn default_is_retryable(error: &TransportError) -> bool {
    matches!(
        error.kind,
        TransportErrorKind::Connect
            | TransportErrorKind::Timeout
            | TransportErrorKind::Unavailable
            | TransportErrorKind::Other
    )
}

impl RetryPolicy {
    /// Start building a policy from the defaults
    pub fn builder() -> RetryPolicyBuilder {
        RetryPolicyBuilder {
            policy: RetryPolicy::default(),
        }
    }

    /// Policy that performs a single attempt
    pub fn no_retry() -> Self {
        Self {
            max_attempts: 1,
            ..Self::default()
        }
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    pub fn attempt_timeout(&self) -> Option<Duration> {
        self.attempt_timeout
    }

    pub fn call_deadline(&self) -> Option<Duration> {
        self.call_deadline
    }

    /// Whether the policy allows another attempt for this failure
    pub fn is_retryable(&self, error: &TransportError) -> bool {
        (self.is_retryable)(error)
    }

    /// Delay to wait after the given failed attempt (1-based):
    /// `min(base_delay * multiplier^(attempt-1), max_delay)`
    pub fn backoff_delay(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(i32::MAX as u32) as i32;
        let factor = self.multiplier.powi(exponent);
        let delay_nanos = (self.base_delay.as_nanos() as f64 * factor).round();

        if !delay_nanos.is_finite() || delay_nanos >= self.max_delay.as_nanos() as f64 {
            return self.max_delay;
        }
        Duration::from_nanos(delay_nanos as u64)
    }
}

/// Builder validating the policy bounds
pub struct RetryPolicyBuilder {
    policy: RetryPolicy,
}

impl RetryPolicyBuilder {
    pub fn max_attempts(mut self, max_attempts: u32) -> Self {
        self.policy.max_attempts = max_attempts;
        self
    }

    pub fn base_delay(mut self, base_delay: Duration) -> Self {
        self.policy.base_delay = base_delay;
        self
    }

    pub fn multiplier(mut self, multiplier: f64) -> Self {
        self.policy.multiplier = multiplier;
        self
    }

    pub fn max_delay(mut self, max_delay: Duration) -> Self {
        self.policy.max_delay = max_delay;
        self
    }

    /// Bound each operation invocation; an elapsed bound is a timeout transport error
    pub fn attempt_timeout(mut self, timeout: Duration) -> Self {
        self.policy.attempt_timeout = Some(timeout);
        self
    }

    /// Bound the whole call including backoff sleeps
    pub fn call_deadline(mut self, deadline: Duration) -> Self {
        self.policy.call_deadline = Some(deadline);
        self
    }

    /// Replace the retryability predicate
    pub fn retry_if<P>(mut self, predicate: P) -> Self
    where
        P: Fn(&TransportError) -> bool + Send + Sync + 'static,
    {
        self.policy.is_retryable = Arc::new(predicate);
        self
    }

    pub fn build(self) -> ConfigResult<RetryPolicy> {
        let policy = self.policy;

        if policy.max_attempts == 0 {
            return Err(ConfigError::invalid("max_attempts", "must be at least 1"));
        }
        if !policy.multiplier.is_finite() || policy.multiplier < 1.0 {
            return Err(ConfigError::invalid(
                "multiplier",
                format!("must be a finite value >= 1.0, got {}", policy.multiplier),
            ));
        }
        if policy.max_delay < policy.base_delay {
            return Err(ConfigError::invalid(
                "max_delay",
                "must not be shorter than base_delay",
            ));
        }

        Ok(policy)
    }
}
