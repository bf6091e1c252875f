use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use pretty_assertions::assert_eq;
use tokio::sync::Notify;
use tokio::time::Instant;
use userbridge_core::{
    CallOutcome, CircuitBreaker, CircuitBreakerConfig, CircuitState, FailureCategory, RawUserId,
    RemoteError, ResilientExecutor, RetryPolicy, TransportError, TransportErrorKind, Trusted,
    UpstreamDetail,
};

fn init_test_tracing() {
    use tracing_subscriber::{fmt, EnvFilter};
    let subscriber = fmt::Subscriber::builder()
        .with_env_filter(
            EnvFilter::from_default_env().add_directive("userbridge_core=debug".parse().unwrap()),
        )
        .with_test_writer()
        .finish();

    let _ = tracing::subscriber::set_global_default(subscriber);
}

fn breaker(threshold: u32, reset: Duration) -> Arc<CircuitBreaker> {
    Arc::new(
        CircuitBreaker::new(
            "data_platform",
            CircuitBreakerConfig {
                failure_threshold: threshold,
                reset_timeout: reset,
            },
        )
        .unwrap(),
    )
}

fn policy(max_attempts: u32) -> RetryPolicy {
    RetryPolicy::builder()
        .max_attempts(max_attempts)
        .base_delay(Duration::from_millis(100))
        .multiplier(2.0)
        .max_delay(Duration::from_secs(1))
        .build()
        .unwrap()
}

fn connect_error() -> RemoteError {
    RemoteError::from(TransportError::new(TransportErrorKind::Connect, "connection refused"))
}

/// Runs one always-failing call and returns how many times the operation ran
async fn failing_call(executor: &ResilientExecutor) -> (CallOutcome<()>, u32) {
    let calls = AtomicU32::new(0);
    let outcome = executor
        .execute(Trusted(()), |_| {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err::<(), _>(connect_error()) }
        })
        .await;
    (outcome, calls.load(Ordering::SeqCst))
}

async fn succeeding_call(executor: &ResilientExecutor) -> (CallOutcome<&'static str>, u32) {
    let calls = AtomicU32::new(0);
    let outcome = executor
        .execute(Trusted(()), |_| {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Ok::<_, RemoteError>("ok") }
        })
        .await;
    (outcome, calls.load(Ordering::SeqCst))
}

#[tokio::test(start_paused = true)]
async fn test_validation_failure_bypasses_breaker_and_retry() {
    init_test_tracing();
    let breaker = breaker(1, Duration::from_secs(30));
    let executor = ResilientExecutor::new(policy(3), breaker.clone());

    // Open the circuit first; validation still runs ahead of the gate.
    let (outcome, _) = failing_call(&ResilientExecutor::new(policy(1), breaker.clone())).await;
    assert_eq!(outcome, CallOutcome::RetriesExhausted);
    assert_eq!(breaker.state(), CircuitState::Open);

    let calls = AtomicU32::new(0);
    let outcome = executor
        .execute(RawUserId("42".to_string()), |_| {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Ok::<_, RemoteError>(()) }
        })
        .await;

    assert!(matches!(outcome, CallOutcome::ValidationFailure(ref reason) if reason.contains("42")));
    assert_eq!(calls.load(Ordering::SeqCst), 0);
    assert_eq!(breaker.snapshot().consecutive_failures, 1);
}

#[tokio::test(start_paused = true)]
async fn test_validation_failure_on_closed_circuit_records_nothing() {
    let breaker = breaker(1, Duration::from_secs(30));
    let executor = ResilientExecutor::new(policy(3), breaker.clone());

    for _ in 0..5 {
        let outcome = executor
            .execute(RawUserId("not-a-uuid".to_string()), |_| async {
                Ok::<_, RemoteError>(())
            })
            .await;
        assert!(matches!(outcome, CallOutcome::ValidationFailure(_)));
    }

    assert_eq!(breaker.state(), CircuitState::Closed);
    assert_eq!(breaker.snapshot().consecutive_failures, 0);
}

#[tokio::test(start_paused = true)]
async fn test_threshold_trips_and_open_circuit_skips_operation() {
    let breaker = breaker(3, Duration::from_secs(30));
    let executor = ResilientExecutor::new(policy(1), breaker.clone());

    for expected in 1..=3 {
        let (outcome, calls) = failing_call(&executor).await;
        assert_eq!(outcome, CallOutcome::RetriesExhausted);
        assert_eq!(calls, 1);
        assert_eq!(breaker.snapshot().consecutive_failures, expected);
    }
    assert_eq!(breaker.state(), CircuitState::Open);

    let (outcome, calls) = succeeding_call(&executor).await;
    assert_eq!(outcome, CallOutcome::CircuitOpen);
    assert_eq!(calls, 0);
}

#[tokio::test(start_paused = true)]
async fn test_threshold_of_one_trips_on_first_failure() {
    let breaker = breaker(1, Duration::from_secs(30));
    let executor = ResilientExecutor::new(policy(2), breaker.clone());

    let (outcome, calls) = failing_call(&executor).await;
    assert_eq!(outcome, CallOutcome::RetriesExhausted);
    assert_eq!(calls, 2);
    assert_eq!(breaker.state(), CircuitState::Open);
}

#[tokio::test(start_paused = true)]
async fn test_exhausted_call_invokes_operation_exactly_max_attempts_times() {
    let breaker = breaker(5, Duration::from_secs(30));
    let executor = ResilientExecutor::new(policy(4), breaker.clone());

    let (outcome, calls) = failing_call(&executor).await;

    assert_eq!(outcome, CallOutcome::RetriesExhausted);
    assert_eq!(calls, 4);
    // One call, one recorded failure regardless of attempts
    assert_eq!(breaker.snapshot().consecutive_failures, 1);
    assert_eq!(breaker.state(), CircuitState::Closed);
}

#[tokio::test(start_paused = true)]
async fn test_single_attempt_disables_retry_but_keeps_breaking() {
    let breaker = breaker(2, Duration::from_secs(30));
    let executor = ResilientExecutor::new(RetryPolicy::no_retry(), breaker.clone());

    let (outcome, calls) = failing_call(&executor).await;
    assert_eq!(outcome, CallOutcome::RetriesExhausted);
    assert_eq!(calls, 1);

    let (_, calls) = failing_call(&executor).await;
    assert_eq!(calls, 1);
    assert_eq!(breaker.state(), CircuitState::Open);
}

#[tokio::test(start_paused = true)]
async fn test_backoff_follows_capped_exponential_schedule() {
    let policy = RetryPolicy::builder()
        .max_attempts(4)
        .base_delay(Duration::from_millis(100))
        .multiplier(2.0)
        .max_delay(Duration::from_millis(250))
        .build()
        .unwrap();
    let executor = ResilientExecutor::new(policy, breaker(10, Duration::from_secs(30)));

    let started = Instant::now();
    let attempts_at = std::sync::Mutex::new(Vec::new());
    let outcome = executor
        .execute(Trusted(()), |_| {
            attempts_at.lock().unwrap().push(started.elapsed());
            async { Err::<(), _>(connect_error()) }
        })
        .await;

    assert_eq!(outcome, CallOutcome::RetriesExhausted);
    let attempts_at = attempts_at.into_inner().unwrap();
    let expected = [0u64, 100, 300, 550];
    assert_eq!(attempts_at.len(), expected.len());
    for (actual, expected_ms) in attempts_at.iter().zip(expected) {
        let expected = Duration::from_millis(expected_ms);
        assert!(
            *actual >= expected && *actual < expected + Duration::from_millis(5),
            "attempt at {actual:?}, expected {expected:?}"
        );
    }
}

#[tokio::test(start_paused = true)]
async fn test_non_retryable_transport_error_fails_fast() {
    let breaker = breaker(5, Duration::from_secs(30));
    let executor = ResilientExecutor::new(policy(3), breaker.clone());
    let calls = AtomicU32::new(0);

    let outcome = executor
        .execute(Trusted(()), |_| {
            calls.fetch_add(1, Ordering::SeqCst);
            async {
                Err::<(), _>(RemoteError::from(TransportError::new(
                    TransportErrorKind::Decode,
                    "invalid json",
                )))
            }
        })
        .await;

    assert!(matches!(outcome, CallOutcome::UpstreamFailure(_)));
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert_eq!(breaker.snapshot().consecutive_failures, 1);
}

#[tokio::test(start_paused = true)]
async fn test_remote_rejection_is_not_retried_and_counts_once() {
    let breaker = breaker(5, Duration::from_secs(30));
    let executor = ResilientExecutor::new(policy(3), breaker.clone());
    let calls = AtomicU32::new(0);

    let outcome = executor
        .execute(Trusted(()), |_| {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err::<(), _>(RemoteError::rejected(Some(400), "column \"foo\" does not exist")) }
        })
        .await;

    assert_eq!(
        outcome,
        CallOutcome::UpstreamFailure(UpstreamDetail::new(
            Some(400),
            "column \"foo\" does not exist"
        ))
    );
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert_eq!(breaker.snapshot().consecutive_failures, 1);

    let failure = outcome.classify().unwrap_err();
    assert_eq!(failure.category, FailureCategory::UpstreamRejected);
    assert_eq!(failure.category.status_code(), 400);
}

#[tokio::test(start_paused = true)]
async fn test_half_open_success_closes_circuit() {
    let breaker = breaker(1, Duration::from_secs(10));
    let executor = ResilientExecutor::new(policy(1), breaker.clone());

    failing_call(&executor).await;
    assert_eq!(breaker.state(), CircuitState::Open);

    tokio::time::advance(Duration::from_secs(10)).await;

    let (outcome, calls) = succeeding_call(&executor).await;
    assert_eq!(outcome, CallOutcome::Success("ok"));
    assert_eq!(calls, 1);
    assert_eq!(breaker.state(), CircuitState::Closed);
    assert_eq!(breaker.snapshot().consecutive_failures, 0);
}

#[tokio::test(start_paused = true)]
async fn test_half_open_failure_reopens_with_fresh_timeout() {
    let breaker = breaker(1, Duration::from_secs(10));
    let executor = ResilientExecutor::new(policy(1), breaker.clone());

    failing_call(&executor).await;
    tokio::time::advance(Duration::from_secs(10)).await;

    let (outcome, calls) = failing_call(&executor).await;
    assert_eq!(outcome, CallOutcome::RetriesExhausted);
    assert_eq!(calls, 1);
    assert_eq!(breaker.state(), CircuitState::Open);

    tokio::time::advance(Duration::from_secs(5)).await;
    let (outcome, calls) = succeeding_call(&executor).await;
    assert_eq!(outcome, CallOutcome::CircuitOpen);
    assert_eq!(calls, 0);

    tokio::time::advance(Duration::from_secs(5)).await;
    let (outcome, _) = succeeding_call(&executor).await;
    assert_eq!(outcome, CallOutcome::Success("ok"));
}

#[tokio::test(start_paused = true)]
async fn test_only_one_trial_call_while_half_open() {
    let breaker = breaker(1, Duration::from_secs(10));
    let executor = ResilientExecutor::new(policy(1), breaker.clone());

    failing_call(&executor).await;
    tokio::time::advance(Duration::from_secs(10)).await;

    let started = Arc::new(Notify::new());
    let release = Arc::new(Notify::new());

    let trial = tokio::spawn({
        let executor = executor.clone();
        let started = started.clone();
        let release = release.clone();
        async move {
            executor
                .execute(Trusted(()), |_| {
                    let started = started.clone();
                    let release = release.clone();
                    async move {
                        started.notify_one();
                        release.notified().await;
                        Ok::<_, RemoteError>("trial")
                    }
                })
                .await
        }
    });

    started.notified().await;
    assert_eq!(breaker.state(), CircuitState::HalfOpen);

    let (outcome, calls) = succeeding_call(&executor).await;
    assert_eq!(outcome, CallOutcome::CircuitOpen);
    assert_eq!(calls, 0);

    release.notify_one();
    assert_eq!(trial.await.unwrap(), CallOutcome::Success("trial"));
    assert_eq!(breaker.state(), CircuitState::Closed);
}

#[tokio::test(start_paused = true)]
async fn test_failed_trial_with_retries_left_reopens_after_one_attempt() {
    let breaker = breaker(1, Duration::from_secs(10));
    let executor = ResilientExecutor::new(policy(3), breaker.clone());

    let (_, calls) = failing_call(&executor).await;
    assert_eq!(calls, 3);
    assert_eq!(breaker.state(), CircuitState::Open);

    tokio::time::advance(Duration::from_secs(10)).await;

    let (outcome, calls) = failing_call(&executor).await;
    assert_eq!(outcome, CallOutcome::RetriesExhausted);
    assert_eq!(calls, 1);
    assert_eq!(breaker.state(), CircuitState::Open);

    // The reset timeout restarts from the trial's failure
    tokio::time::advance(Duration::from_secs(9)).await;
    let (outcome, calls) = succeeding_call(&executor).await;
    assert_eq!(outcome, CallOutcome::CircuitOpen);
    assert_eq!(calls, 0);

    tokio::time::advance(Duration::from_secs(1)).await;
    let (outcome, calls) = succeeding_call(&executor).await;
    assert_eq!(outcome, CallOutcome::Success("ok"));
    assert_eq!(calls, 1);
    assert_eq!(breaker.state(), CircuitState::Closed);
}

#[tokio::test(start_paused = true)]
async fn test_failed_trial_with_non_retryable_error_reopens() {
    let breaker = breaker(1, Duration::from_secs(10));
    let executor = ResilientExecutor::new(policy(3), breaker.clone());

    failing_call(&executor).await;
    tokio::time::advance(Duration::from_secs(10)).await;

    let calls = AtomicU32::new(0);
    let outcome = executor
        .execute(Trusted(()), |_| {
            calls.fetch_add(1, Ordering::SeqCst);
            async {
                Err::<(), _>(RemoteError::from(TransportError::new(
                    TransportErrorKind::Decode,
                    "invalid json",
                )))
            }
        })
        .await;

    assert!(matches!(outcome, CallOutcome::UpstreamFailure(_)));
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert_eq!(breaker.state(), CircuitState::Open);
}

#[tokio::test(start_paused = true)]
async fn test_call_in_backoff_is_not_admitted_beside_half_open_trial() {
    let breaker = breaker(1, Duration::from_millis(50));
    let retrying = ResilientExecutor::new(policy(3), breaker.clone());
    let single = ResilientExecutor::new(policy(1), breaker.clone());

    // Admitted while closed, fails once, then backs off for 100ms
    let first_attempt = Arc::new(Notify::new());
    let calls = Arc::new(AtomicU32::new(0));
    let pending = tokio::spawn({
        let retrying = retrying.clone();
        let first_attempt = first_attempt.clone();
        let calls = calls.clone();
        async move {
            retrying
                .execute(Trusted(()), |_| {
                    calls.fetch_add(1, Ordering::SeqCst);
                    first_attempt.notify_one();
                    async { Err::<(), _>(connect_error()) }
                })
                .await
        }
    });
    first_attempt.notified().await;

    let (outcome, _) = failing_call(&single).await;
    assert_eq!(outcome, CallOutcome::RetriesExhausted);
    assert_eq!(breaker.state(), CircuitState::Open);

    tokio::time::advance(Duration::from_millis(50)).await;

    let started = Arc::new(Notify::new());
    let release = Arc::new(Notify::new());
    let trial = tokio::spawn({
        let retrying = retrying.clone();
        let started = started.clone();
        let release = release.clone();
        async move {
            retrying
                .execute(Trusted(()), |_| {
                    let started = started.clone();
                    let release = release.clone();
                    async move {
                        started.notify_one();
                        release.notified().await;
                        Ok::<_, RemoteError>("trial")
                    }
                })
                .await
        }
    });
    started.notified().await;
    assert_eq!(breaker.state(), CircuitState::HalfOpen);

    // Backoff ends while the trial is still in flight
    tokio::time::advance(Duration::from_millis(50)).await;
    assert_eq!(pending.await.unwrap(), CallOutcome::CircuitOpen);
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert_eq!(breaker.state(), CircuitState::HalfOpen);

    release.notify_one();
    assert_eq!(trial.await.unwrap(), CallOutcome::Success("trial"));
    assert_eq!(breaker.state(), CircuitState::Closed);
}

#[tokio::test(start_paused = true)]
async fn test_circuit_opened_during_backoff_aborts_retry() {
    let breaker = breaker(1, Duration::from_secs(30));
    let retrying = ResilientExecutor::new(policy(3), breaker.clone());
    let single = ResilientExecutor::new(policy(1), breaker.clone());

    let first_attempt = Arc::new(Notify::new());
    let calls = Arc::new(AtomicU32::new(0));

    let pending = tokio::spawn({
        let first_attempt = first_attempt.clone();
        let calls = calls.clone();
        async move {
            retrying
                .execute(Trusted(()), |_| {
                    calls.fetch_add(1, Ordering::SeqCst);
                    first_attempt.notify_one();
                    async { Err::<(), _>(connect_error()) }
                })
                .await
        }
    });

    first_attempt.notified().await;
    let (outcome, _) = failing_call(&single).await;
    assert_eq!(outcome, CallOutcome::RetriesExhausted);
    assert_eq!(breaker.state(), CircuitState::Open);

    assert_eq!(pending.await.unwrap(), CallOutcome::CircuitOpen);
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    // The abandoned call records nothing beyond the failure that opened the circuit
    assert_eq!(breaker.snapshot().consecutive_failures, 1);
}

#[tokio::test(start_paused = true)]
async fn test_call_deadline_stops_retrying() {
    let policy = RetryPolicy::builder()
        .max_attempts(10)
        .base_delay(Duration::from_millis(100))
        .multiplier(2.0)
        .max_delay(Duration::from_secs(5))
        .call_deadline(Duration::from_millis(250))
        .build()
        .unwrap();
    let executor = ResilientExecutor::new(policy, breaker(5, Duration::from_secs(30)));

    let (outcome, calls) = failing_call(&executor).await;

    // Attempts at 0ms and 100ms; the next backoff (200ms) would cross 250ms
    assert_eq!(outcome, CallOutcome::RetriesExhausted);
    assert_eq!(calls, 2);
}

#[tokio::test(start_paused = true)]
async fn test_unavailable_outcomes_classify_without_internals() {
    let breaker = breaker(1, Duration::from_secs(30));
    let executor = ResilientExecutor::new(policy(3), breaker);

    let (exhausted, _) = failing_call(&executor).await;
    let (open, _) = failing_call(&executor).await;

    for outcome in [exhausted, open] {
        let failure = outcome.classify().unwrap_err();
        assert_eq!(failure.category.status_code(), 503);
        let detail = failure.detail.unwrap_or_default();
        assert!(!detail.contains("attempt"));
        assert!(!detail.chars().any(|c| c.is_ascii_digit()), "{detail}");
    }
}
