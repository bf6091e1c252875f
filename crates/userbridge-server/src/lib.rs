//!
//! Userbridge Server - REST facade over the data platform
//!
//! This module exports all the components of the Userbridge Server.

use std::sync::Arc;

/// API module
pub mod api;

/// Configuration module
pub mod config;

/// Error module
pub mod error;

/// Logging module
pub mod logging;

/// Models module
pub mod models;

/// Data platform module
pub mod platform;

/// Server module
pub mod server;

// Re-export key types
pub use crate::config::{PlatformConfig, ServerConfig};
pub use error::{ServerError, ServerResult};
pub use platform::{DataPlatform, HttpDataPlatform};
pub use server::BridgeServer;

/// Run function
pub async fn run(config: ServerConfig) -> ServerResult<()> {
    // Initialize logging
    logging::init_logging(&config);

    // Create dependencies
    let platform: Arc<dyn DataPlatform> = Arc::new(HttpDataPlatform::new(&config.platform)?);

    // Create server
    let server = BridgeServer::new(config, platform)?;

    // Run server
    server.run().await
}
