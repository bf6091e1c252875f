//! Error types for the userbridge core
//!
//! Validation, transport and remote-rejection errors feed the resilient
//! executor; probe and configuration errors stay local to their modules.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Caller input failed domain validation
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{0}")]
pub struct ValidationError(pub String);

impl ValidationError {
    /// Create a validation error from a reason
    pub fn new(reason: impl Into<String>) -> Self {
        Self(reason.into())
    }

    /// The human-readable reason
    pub fn reason(&self) -> &str {
        &self.0
    }
}

/// Kind of transport-level failure, used by retry predicates
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransportErrorKind {
    /// Could not establish a connection
    Connect,
    /// The operation did not complete in time
    Timeout,
    /// Upstream answered with a gateway or throttling status (429, 502, 503, 504)
    Unavailable,
    /// The response could not be read or decoded
    Decode,
    /// Anything else at the transport layer
    Other,
}

impl std::fmt::Display for TransportErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TransportErrorKind::Connect => write!(f, "connect"),
            TransportErrorKind::Timeout => write!(f, "timeout"),
            TransportErrorKind::Unavailable => write!(f, "unavailable"),
            TransportErrorKind::Decode => write!(f, "decode"),
            TransportErrorKind::Other => write!(f, "other"),
        }
    }
}

/// Network or connection-level failure talking to the upstream
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{kind} error: {message}")]
pub struct TransportError {
    /// Failure kind
    pub kind: TransportErrorKind,
    /// Diagnostic message
    pub message: String,
}

impl TransportError {
    /// Create a transport error of the given kind
    pub fn new(kind: TransportErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    /// Shorthand for a timeout error
    pub fn timeout(message: impl Into<String>) -> Self {
        Self::new(TransportErrorKind::Timeout, message)
    }
}

/// Failure reported by a remote operation
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RemoteError {
    /// Transport-level failure; participates in retry and breaker accounting
    #[error("transport failure: {0}")]
    Transport(#[from] TransportError),

    /// Well-formed error response from the remote system; never retried
    #[error("remote rejected the request: {detail}")]
    Rejected {
        /// Upstream status code, when the remote reported one
        status: Option<u16>,
        /// Upstream detail text
        detail: String,
    },
}

impl RemoteError {
    /// Create a remote rejection
    pub fn rejected(status: Option<u16>, detail: impl Into<String>) -> Self {
        RemoteError::Rejected {
            status,
            detail: detail.into(),
        }
    }
}

/// Errors raised while evaluating a health probe
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ProbeError {
    /// Threshold outside the 0-100 range
    #[error("invalid threshold {0}: must be within 0..=100")]
    InvalidThreshold(f32),

    /// Resource sampling failed
    #[error("sampling failed: {0}")]
    Sampling(String),

    /// The checked dependency could not be reached or answered with an error
    #[error("dependency check failed: {0}")]
    Dependency(String),

    /// The probe did not finish in time
    #[error("probe timed out after {0}ms")]
    Timeout(u64),
}

/// Invalid resilience or probe configuration
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConfigError {
    /// A configured value violates its documented bounds
    #[error("invalid {field}: {reason}")]
    Invalid {
        /// Offending field
        field: &'static str,
        /// Why it was rejected
        reason: String,
    },
}

impl ConfigError {
    pub(crate) fn invalid(field: &'static str, reason: impl Into<String>) -> Self {
        ConfigError::Invalid {
            field,
            reason: reason.into(),
        }
    }
}

/// Result type for configuration validation
pub type ConfigResult<T> = Result<T, ConfigError>;
