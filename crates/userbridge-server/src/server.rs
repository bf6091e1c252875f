//! Userbridge server
//!
//! Owns the data platform client, the resilient executor guarding it and the
//! health aggregator, and serves the API router.

use std::net::SocketAddr;
use std::sync::Arc;

use tokio::net::TcpListener;
use tracing::info;
use userbridge_core::{HealthAggregator, ResilientExecutor};

use crate::config::ServerConfig;
use crate::error::ServerResult;
use crate::platform::{DataPlatform, PlatformStatus};

/// Name of the circuit and health component for the data platform
pub const DATA_PLATFORM: &str = "data_platform";

/// Userbridge server
#[derive(Debug, Clone)]
pub struct BridgeServer {
    /// Server configuration
    config: ServerConfig,

    /// Data platform client
    platform: Arc<dyn DataPlatform>,

    /// Retry and circuit breaking around data platform calls
    executor: ResilientExecutor,

    /// Health probes
    health: HealthAggregator,
}

impl BridgeServer {
    /// Create a server with the configured executor and the standard probes
    pub fn new(config: ServerConfig, platform: Arc<dyn DataPlatform>) -> ServerResult<Self> {
        let executor = config.resilience.build_executor(DATA_PLATFORM)?;

        let health = HealthAggregator::new()
            .with_probe("cpu", Arc::new(config.probes.cpu_probe()?))
            .with_probe("disk", Arc::new(config.probes.disk_probe()?))
            .with_probe(
                DATA_PLATFORM,
                Arc::new(
                    config
                        .probes
                        .dependency_probe(DATA_PLATFORM, Arc::new(PlatformStatus(platform.clone()))),
                ),
            );

        Ok(Self::from_parts(config, platform, executor, health))
    }

    /// Assemble a server from prebuilt parts
    pub fn from_parts(
        config: ServerConfig,
        platform: Arc<dyn DataPlatform>,
        executor: ResilientExecutor,
        health: HealthAggregator,
    ) -> Self {
        Self {
            config,
            platform,
            executor,
            health,
        }
    }

    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    pub fn platform(&self) -> &Arc<dyn DataPlatform> {
        &self.platform
    }

    pub fn executor(&self) -> &ResilientExecutor {
        &self.executor
    }

    pub fn health(&self) -> &HealthAggregator {
        &self.health
    }

    /// Bind the configured address and serve until the listener fails
    pub async fn run(self) -> ServerResult<()> {
        info!("Starting Userbridge Server");

        let listener =
            TcpListener::bind((self.config.bind_address.as_str(), self.config.port)).await?;
        let addr: SocketAddr = listener.local_addr()?;
        info!("Listening on {}", addr);

        let app = crate::api::build_router(Arc::new(self));
        axum::serve(listener, app).await?;

        Ok(())
    }
}
