//! Resilient call executor
//!
//! Runs a remote operation as one ordered pipeline: validate the input, ask
//! the circuit breaker for admission, then attempt the operation under the
//! retry policy, re-checking the breaker before each retry. Every termination
//! path ends in a [`CallOutcome`].

use std::future::Future;
use std::sync::Arc;

use tokio::time::Instant;
use tracing::{debug, warn};

use crate::error::{RemoteError, TransportError};
use crate::outcome::{CallOutcome, UpstreamDetail};
use crate::resilience::circuit_breaker::{CircuitBreaker, CircuitOpen, CircuitSnapshot};
use crate::resilience::retry::RetryPolicy;
use crate::validation::ValidateInput;

/// Retry-with-backoff and circuit breaking around one upstream.
///
/// Executors are cheap to clone; clones share the same breaker. Several
/// executors may also share a breaker explicitly via [`ResilientExecutor::new`].
#[derive(Debug, Clone)]
pub struct ResilientExecutor {
    policy: RetryPolicy,
    breaker: Arc<CircuitBreaker>,
}

impl ResilientExecutor {
    pub fn new(policy: RetryPolicy, breaker: Arc<CircuitBreaker>) -> Self {
        Self { policy, breaker }
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    pub fn breaker(&self) -> &Arc<CircuitBreaker> {
        &self.breaker
    }

    pub fn circuit(&self) -> CircuitSnapshot {
        self.breaker.snapshot()
    }

    /// Execute `operation` with the validated form of `input`.
    ///
    /// The operation receives a reference to the validated input on every
    /// attempt, so it must clone whatever its future needs to own.
    pub async fn execute<I, T, F, Fut>(&self, input: I, mut operation: F) -> CallOutcome<T>
    where
        I: ValidateInput,
        F: FnMut(&I::Validated) -> Fut,
        Fut: Future<Output = Result<T, RemoteError>>,
    {
        let validated = match input.validate() {
            Ok(validated) => validated,
            Err(err) => {
                debug!(circuit = %self.breaker.name(), reason = %err, "Input rejected before upstream call");
                return CallOutcome::ValidationFailure(err.reason().to_string());
            }
        };

        let permit = match self.breaker.try_acquire() {
            Ok(permit) => permit,
            Err(CircuitOpen) => return CallOutcome::CircuitOpen,
        };

        let max_attempts = self.policy.max_attempts();
        let deadline = self.policy.call_deadline().map(|d| Instant::now() + d);
        let mut attempt = 1;

        loop {
            match self.attempt(&mut operation, &validated).await {
                Ok(payload) => {
                    if attempt > 1 {
                        debug!(circuit = %self.breaker.name(), attempt, "Upstream call succeeded after retry");
                    }
                    permit.success();
                    return CallOutcome::Success(payload);
                }
                Err(RemoteError::Rejected { status, detail }) => {
                    debug!(circuit = %self.breaker.name(), ?status, "Upstream rejected the request");
                    permit.failure();
                    return CallOutcome::UpstreamFailure(UpstreamDetail::new(status, detail));
                }
                Err(RemoteError::Transport(err)) => {
                    if !self.policy.is_retryable(&err) {
                        warn!(circuit = %self.breaker.name(), error = %err, "Non-retryable transport failure");
                        permit.failure();
                        return CallOutcome::UpstreamFailure(UpstreamDetail::from(&err));
                    }

                    // A failed half-open trial reopens the circuit immediately.
                    if permit.is_trial() {
                        warn!(
                            circuit = %self.breaker.name(),
                            attempts = attempt,
                            error = %err,
                            "Half-open trial failed, not retrying"
                        );
                        permit.failure();
                        return CallOutcome::RetriesExhausted;
                    }

                    if attempt >= max_attempts {
                        warn!(
                            circuit = %self.breaker.name(),
                            attempts = attempt,
                            error = %err,
                            "Retries exhausted"
                        );
                        permit.failure();
                        return CallOutcome::RetriesExhausted;
                    }

                    let delay = self.policy.backoff_delay(attempt);
                    if deadline.is_some_and(|deadline| Instant::now() + delay > deadline) {
                        warn!(
                            circuit = %self.breaker.name(),
                            attempts = attempt,
                            error = %err,
                            "Call deadline reached before next retry"
                        );
                        permit.failure();
                        return CallOutcome::RetriesExhausted;
                    }

                    warn!(
                        circuit = %self.breaker.name(),
                        attempt,
                        max_attempts,
                        delay_ms = delay.as_millis() as u64,
                        error = %err,
                        "Retryable upstream failure, backing off"
                    );
                    tokio::time::sleep(delay).await;

                    if !permit.still_admitted() {
                        debug!(
                            circuit = %self.breaker.name(),
                            state = %self.breaker.state(),
                            "Circuit left closed during backoff, abandoning call"
                        );
                        return CallOutcome::CircuitOpen;
                    }
                    attempt += 1;
                }
            }
        }
    }

    async fn attempt<V, T, F, Fut>(&self, operation: &mut F, input: &V) -> Result<T, RemoteError>
    where
        F: FnMut(&V) -> Fut,
        Fut: Future<Output = Result<T, RemoteError>>,
    {
        match self.policy.attempt_timeout() {
            Some(timeout) => match tokio::time::timeout(timeout, operation(input)).await {
                Ok(result) => result,
                Err(_) => Err(TransportError::timeout(format!(
                    "attempt exceeded {}ms",
                    timeout.as_millis()
                ))
                .into()),
            },
            None => operation(input).await,
        }
    }
}
