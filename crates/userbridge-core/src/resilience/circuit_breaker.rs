//!
//! Circuit breaker pattern implementation
//! Stops calling a failing upstream for a cooldown period, then lets a single
//! trial call through to test whether it recovered.
//!

use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::error::{ConfigError, ConfigResult};

/// Circuit breaker states
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CircuitState {
    /// Circuit is closed (normal operation)
    #[default]
    Closed = 0,
    /// Circuit is open (failing fast)
    Open = 1,
    /// Circuit is half-open (one trial call testing recovery)
    HalfOpen = 2,
}

impl From<u8> for CircuitState {
    fn from(value: u8) -> Self {
        match value {
            0 => CircuitState::Closed,
            2 => CircuitState::HalfOpen,
            _ => CircuitState::Open,
        }
    }
}

impl std::fmt::Display for CircuitState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CircuitState::Closed => write!(f, "CLOSED"),
            CircuitState::Open => write!(f, "OPEN"),
            CircuitState::HalfOpen => write!(f, "HALF_OPEN"),
        }
    }
}

/// Circuit breaker configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CircuitBreakerConfig {
    /// Number of consecutive failures before opening the circuit
    pub failure_threshold: u32,

    /// Time to stay open before allowing a trial call
    pub reset_timeout: Duration,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            reset_timeout: Duration::from_secs(30),
        }
    }
}

impl CircuitBreakerConfig {
    pub fn validate(&self) -> ConfigResult<()> {
        if self.failure_threshold == 0 {
            return Err(ConfigError::invalid("failure_threshold", "must be at least 1"));
        }
        Ok(())
    }
}

/// Returned when the circuit rejects a call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CircuitOpen;

/// Mutable circuit bookkeeping, only touched under the breaker lock
#[derive(Debug)]
struct CircuitInner {
    state: CircuitState,
    consecutive_failures: u32,
    last_failure_at: Option<Instant>,
    last_failure_wall: Option<DateTime<Utc>>,
    open_until: Option<Instant>,
    trial_in_flight: bool,
}

/// Point-in-time view of a circuit
#[derive(Debug, Clone, Serialize)]
pub struct CircuitSnapshot {
    /// Upstream this circuit protects
    pub name: String,
    /// Current state
    pub state: CircuitState,
    /// Consecutive failures recorded since the last success
    pub consecutive_failures: u32,
    /// Wall-clock time of the last recorded failure
    pub last_failure_at: Option<DateTime<Utc>>,
    /// Remaining cooldown while open
    #[serde(skip)]
    pub open_for: Option<Duration>,
}

/// Circuit breaker for one logical upstream target.
///
/// Every state transition goes through a single mutex that is never held
/// across an `.await`. The state is mirrored in an atomic so the closed-circuit
/// path can admit calls without taking the lock.
#[derive(Debug)]
pub struct CircuitBreaker {
    name: String,
    config: CircuitBreakerConfig,
    state: AtomicU8,
    inner: Mutex<CircuitInner>,
}

impl CircuitBreaker {
    /// Create a new circuit breaker in the closed state
    pub fn new(name: impl Into<String>, config: CircuitBreakerConfig) -> ConfigResult<Self> {
        config.validate()?;
        let name = name.into();

        info!(
            circuit = %name,
            failure_threshold = config.failure_threshold,
            reset_timeout_ms = config.reset_timeout.as_millis() as u64,
            "Circuit breaker initialized"
        );

        Ok(Self {
            name,
            config,
            state: AtomicU8::new(CircuitState::Closed as u8),
            inner: Mutex::new(CircuitInner {
                state: CircuitState::Closed,
                consecutive_failures: 0,
                last_failure_at: None,
                last_failure_wall: None,
                open_until: None,
                trial_in_flight: false,
            }),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn config(&self) -> &CircuitBreakerConfig {
        &self.config
    }

    /// Last published state; does not perform the open → half-open transition
    pub fn state(&self) -> CircuitState {
        CircuitState::from(self.state.load(Ordering::Acquire))
    }

    /// Ask the circuit to admit one call.
    ///
    /// An expired open circuit moves to half-open and hands out the single
    /// trial permit; everyone else is rejected until the trial reports back.
    pub fn try_acquire(&self) -> Result<CallPermit<'_>, CircuitOpen> {
        if self.state() == CircuitState::Closed {
            return Ok(CallPermit::new(self, false));
        }

        let mut inner = self.lock();
        let now = Instant::now();

        match inner.state {
            CircuitState::Closed => Ok(CallPermit::new(self, false)),
            CircuitState::Open => {
                let expired = inner.open_until.map_or(true, |until| now >= until);
                if !expired {
                    debug!(circuit = %self.name, "Call rejected, circuit open");
                    return Err(CircuitOpen);
                }

                self.transition(&mut inner, CircuitState::HalfOpen);
                inner.trial_in_flight = true;
                info!(circuit = %self.name, "Circuit half-open, admitting trial call");
                Ok(CallPermit::new(self, true))
            }
            CircuitState::HalfOpen => {
                if inner.trial_in_flight {
                    debug!(circuit = %self.name, "Call rejected, half-open trial in flight");
                    Err(CircuitOpen)
                } else {
                    inner.trial_in_flight = true;
                    Ok(CallPermit::new(self, true))
                }
            }
        }
    }

    /// Current snapshot for health reporting and diagnostics
    pub fn snapshot(&self) -> CircuitSnapshot {
        let inner = self.lock();
        let now = Instant::now();
        CircuitSnapshot {
            name: self.name.clone(),
            state: inner.state,
            consecutive_failures: inner.consecutive_failures,
            last_failure_at: inner.last_failure_wall,
            open_for: inner
                .open_until
                .filter(|_| inner.state == CircuitState::Open)
                .map(|until| until.saturating_duration_since(now)),
        }
    }

    /// Force the circuit back to closed
    pub fn reset(&self) {
        let mut inner = self.lock();
        warn!(circuit = %self.name, "Circuit breaker forced closed");
        inner.consecutive_failures = 0;
        inner.trial_in_flight = false;
        self.transition(&mut inner, CircuitState::Closed);
    }

    fn record_success(&self, trial: bool) {
        let mut inner = self.lock();
        inner.consecutive_failures = 0;
        if trial {
            inner.trial_in_flight = false;
        }

        if inner.state != CircuitState::Closed {
            info!(circuit = %self.name, previous = %inner.state, "Circuit breaker closed (recovered)");
            inner.trial_in_flight = false;
            self.transition(&mut inner, CircuitState::Closed);
        }
    }

    fn record_failure(&self, trial: bool) {
        let mut inner = self.lock();
        let now = Instant::now();

        inner.consecutive_failures = inner.consecutive_failures.saturating_add(1);
        inner.last_failure_at = Some(now);
        inner.last_failure_wall = Some(Utc::now());

        match inner.state {
            CircuitState::HalfOpen if trial => {
                inner.trial_in_flight = false;
                warn!(circuit = %self.name, "Half-open trial failed, reopening circuit");
                self.open(&mut inner, now);
            }
            CircuitState::Closed | CircuitState::HalfOpen => {
                if inner.consecutive_failures >= self.config.failure_threshold
                    && inner.state == CircuitState::Closed
                {
                    warn!(
                        circuit = %self.name,
                        consecutive_failures = inner.consecutive_failures,
                        failure_threshold = self.config.failure_threshold,
                        "Circuit breaker opened (failing fast)"
                    );
                    self.open(&mut inner, now);
                } else {
                    debug!(
                        circuit = %self.name,
                        consecutive_failures = inner.consecutive_failures,
                        "Failure recorded"
                    );
                }
            }
            CircuitState::Open => {
                debug!(circuit = %self.name, "Failure recorded while circuit already open");
            }
        }
    }

    fn release_trial(&self) {
        let mut inner = self.lock();
        if inner.state == CircuitState::HalfOpen && inner.trial_in_flight {
            debug!(circuit = %self.name, "Trial permit dropped without a result");
            inner.trial_in_flight = false;
        }
    }

    fn open(&self, inner: &mut CircuitInner, now: Instant) {
        inner.open_until = Some(now + self.config.reset_timeout);
        self.transition(inner, CircuitState::Open);
    }

    fn transition(&self, inner: &mut CircuitInner, new_state: CircuitState) {
        if new_state != CircuitState::Open {
            inner.open_until = None;
        }
        inner.state = new_state;
        self.state.store(new_state as u8, Ordering::Release);
    }

    fn lock(&self) -> MutexGuard<'_, CircuitInner> {
        // The guarded data stays consistent even if a holder panicked.
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// Admission ticket for one call.
///
/// Report the call result with [`CallPermit::success`] or
/// [`CallPermit::failure`]. Dropping a trial permit without a result frees the
/// half-open slot so a cancelled caller cannot wedge the circuit.
#[derive(Debug)]
pub struct CallPermit<'a> {
    breaker: &'a CircuitBreaker,
    trial: bool,
    settled: bool,
}

impl<'a> CallPermit<'a> {
    fn new(breaker: &'a CircuitBreaker, trial: bool) -> Self {
        Self {
            breaker,
            trial,
            settled: false,
        }
    }

    /// Whether this permit is the half-open trial
    pub fn is_trial(&self) -> bool {
        self.trial
    }

    /// Whether the circuit still admits this caller's next attempt.
    ///
    /// A permit issued while closed stays valid only while the circuit is
    /// closed; once it leaves closed, the half-open trial is the only call
    /// allowed through.
    pub fn still_admitted(&self) -> bool {
        match self.breaker.state() {
            CircuitState::Closed => !self.trial,
            CircuitState::HalfOpen => self.trial,
            CircuitState::Open => false,
        }
    }

    pub fn success(mut self) {
        self.settled = true;
        self.breaker.record_success(self.trial);
    }

    pub fn failure(mut self) {
        self.settled = true;
        self.breaker.record_failure(self.trial);
    }
}

impl Drop for CallPermit<'_> {
    fn drop(&mut self) {
        if !self.settled && self.trial {
            self.breaker.release_trial();
        }
    }
}
