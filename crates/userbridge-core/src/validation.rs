//! Input validation performed before any upstream activity

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::ValidationError;

/// Caller input that must be validated before a remote operation runs
pub trait ValidateInput {
    /// Input type handed to the remote operation
    type Validated;

    fn validate(self) -> Result<Self::Validated, ValidationError>;
}

/// Input that needs no validation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Trusted<T>(pub T);

impl<T> ValidateInput for Trusted<T> {
    type Validated = T;

    fn validate(self) -> Result<T, ValidationError> {
        Ok(self.0)
    }
}

/// Identifier of a user record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(Uuid);

impl UserId {
    pub fn parse(raw: &str) -> Result<Self, ValidationError> {
        Uuid::parse_str(raw.trim())
            .map(UserId)
            .map_err(|_| ValidationError::new(format!("Invalid user ID format: '{raw}' is not a valid UUID")))
    }

    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.hyphenated())
    }
}

impl FromStr for UserId {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        UserId::parse(s)
    }
}

/// Unparsed user identifier, as received from a path segment
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawUserId(pub String);

impl ValidateInput for RawUserId {
    type Validated = UserId;

    fn validate(self) -> Result<UserId, ValidationError> {
        UserId::parse(&self.0)
    }
}
