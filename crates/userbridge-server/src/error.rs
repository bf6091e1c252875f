//! Error types for the Userbridge Server
//!
//! This module contains the error types used throughout the server.

use thiserror::Error;

/// Server error types
#[derive(Error, Debug)]
pub enum ServerError {
    /// Configuration could not be loaded or is invalid
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// Data platform client could not be set up
    #[error("Data platform error: {0}")]
    PlatformError(String),

    /// Internal server error
    #[error("Internal server error: {0}")]
    InternalError(String),
}

/// Result type for server operations
pub type ServerResult<T> = Result<T, ServerError>;

impl From<config::ConfigError> for ServerError {
    fn from(err: config::ConfigError) -> Self {
        ServerError::ConfigError(err.to_string())
    }
}

impl From<userbridge_core::ConfigError> for ServerError {
    fn from(err: userbridge_core::ConfigError) -> Self {
        ServerError::ConfigError(err.to_string())
    }
}

impl From<userbridge_core::ProbeError> for ServerError {
    fn from(err: userbridge_core::ProbeError) -> Self {
        ServerError::ConfigError(err.to_string())
    }
}

impl From<reqwest::Error> for ServerError {
    fn from(err: reqwest::Error) -> Self {
        ServerError::PlatformError(format!("HTTP client error: {}", err))
    }
}

impl From<std::io::Error> for ServerError {
    fn from(err: std::io::Error) -> Self {
        ServerError::InternalError(format!("IO error: {}", err))
    }
}
