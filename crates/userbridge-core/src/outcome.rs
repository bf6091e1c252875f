//! Call outcomes and their classification into caller-visible categories
//!
//! [`CallOutcome`] is what the resilient executor returns for every call.
//! [`CallOutcome::classify`] is the single place where outcomes turn into
//! error categories; retry counts and breaker timers never cross it.

use serde::{Deserialize, Serialize};

use crate::error::TransportError;

/// Detail carried by an upstream failure
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpstreamDetail {
    /// Status reported by the upstream, if any
    pub status: Option<u16>,
    /// Human-readable upstream text
    pub message: String,
}

impl UpstreamDetail {
    pub fn new(status: Option<u16>, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }
}

impl From<&TransportError> for UpstreamDetail {
    fn from(err: &TransportError) -> Self {
        Self::new(None, err.to_string())
    }
}

/// Result of one resilient call
#[derive(Debug, Clone, PartialEq)]
pub enum CallOutcome<T> {
    /// The operation succeeded
    Success(T),
    /// Caller input was rejected before any upstream activity
    ValidationFailure(String),
    /// The upstream rejected the call or failed in a non-retryable way
    UpstreamFailure(UpstreamDetail),
    /// Every allowed attempt failed with a retryable error
    RetriesExhausted,
    /// The circuit breaker refused the call
    CircuitOpen,
}

impl<T> CallOutcome<T> {
    pub fn is_success(&self) -> bool {
        matches!(self, CallOutcome::Success(_))
    }

    /// Transform the success payload
    pub fn map<U, F>(self, f: F) -> CallOutcome<U>
    where
        F: FnOnce(T) -> U,
    {
        match self {
            CallOutcome::Success(payload) => CallOutcome::Success(f(payload)),
            CallOutcome::ValidationFailure(reason) => CallOutcome::ValidationFailure(reason),
            CallOutcome::UpstreamFailure(detail) => CallOutcome::UpstreamFailure(detail),
            CallOutcome::RetriesExhausted => CallOutcome::RetriesExhausted,
            CallOutcome::CircuitOpen => CallOutcome::CircuitOpen,
        }
    }

    /// Pass a success through, or map the failure to its category
    pub fn classify(self) -> Result<T, ClassifiedFailure> {
        match self {
            CallOutcome::Success(payload) => Ok(payload),
            CallOutcome::ValidationFailure(reason) => Err(ClassifiedFailure {
                category: FailureCategory::BadRequest,
                detail: Some(reason),
            }),
            CallOutcome::UpstreamFailure(detail) => Err(ClassifiedFailure {
                category: FailureCategory::UpstreamRejected,
                detail: Some(detail.message),
            }),
            CallOutcome::RetriesExhausted => Err(ClassifiedFailure {
                category: FailureCategory::RetriesExhausted,
                detail: Some(UNAVAILABLE_DETAIL.to_string()),
            }),
            CallOutcome::CircuitOpen => Err(ClassifiedFailure {
                category: FailureCategory::CircuitOpen,
                detail: Some(UNAVAILABLE_DETAIL.to_string()),
            }),
        }
    }
}

const UNAVAILABLE_DETAIL: &str = "The service is temporarily unavailable, please try again later";

/// Caller-visible failure category
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureCategory {
    /// Caller input was malformed
    BadRequest,
    /// The upstream rejected the request
    UpstreamRejected,
    /// Service unavailable after exhausting retries
    RetriesExhausted,
    /// Service unavailable because the circuit is open
    CircuitOpen,
}

impl FailureCategory {
    /// HTTP status equivalent
    pub fn status_code(self) -> u16 {
        match self {
            FailureCategory::BadRequest | FailureCategory::UpstreamRejected => 400,
            FailureCategory::RetriesExhausted | FailureCategory::CircuitOpen => 503,
        }
    }

    /// Machine-stable error code
    pub fn error_code(self) -> &'static str {
        match self {
            FailureCategory::BadRequest => "ERR_BAD_REQUEST",
            FailureCategory::UpstreamRejected => "ERR_UPSTREAM_REJECTED",
            FailureCategory::RetriesExhausted => "ERR_RETRIES_EXHAUSTED",
            FailureCategory::CircuitOpen => "ERR_CIRCUIT_OPEN",
        }
    }

    pub fn is_unavailable(self) -> bool {
        self.status_code() == 503
    }
}

impl std::fmt::Display for FailureCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FailureCategory::BadRequest => write!(f, "bad request"),
            FailureCategory::UpstreamRejected => write!(f, "upstream rejected"),
            FailureCategory::RetriesExhausted => {
                write!(f, "service unavailable, retries exhausted")
            }
            FailureCategory::CircuitOpen => write!(f, "service unavailable, circuit open"),
        }
    }
}

/// Category plus optional human-readable detail
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassifiedFailure {
    pub category: FailureCategory,
    pub detail: Option<String>,
}

impl std::fmt::Display for ClassifiedFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.detail {
            Some(detail) => write!(f, "{}: {}", self.category, detail),
            None => write!(f, "{}", self.category),
        }
    }
}

impl std::error::Error for ClassifiedFailure {}
