//! Configuration for the Userbridge Server
//!
//! Values come from an optional file named by `USERBRIDGE_CONFIG`, then from
//! `USERBRIDGE_*` environment variables (`__` separates nested keys, e.g.
//! `USERBRIDGE_PLATFORM__URL`). The data platform's conventional
//! `SUPABASE_*` variables are accepted as lowest-priority fallbacks.

use config::builder::DefaultState;
use config::{Config, ConfigBuilder, Environment, File};
use serde::{Deserialize, Serialize};
use std::env;
use tracing::warn;
use userbridge_core::{ProbeConfig, ResilienceConfig};

use crate::error::{ServerError, ServerResult};

/// Server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Port to listen on
    #[serde(default = "default_port")]
    pub port: u16,

    /// Host to bind to
    #[serde(default = "default_host")]
    pub bind_address: String,

    /// Log level used when `RUST_LOG` is not set
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Emit JSON logs instead of human-readable ones
    #[serde(default)]
    pub json_logs: bool,

    /// Data platform connection
    #[serde(default)]
    pub platform: PlatformConfig,

    /// Retry and circuit breaker settings for data platform calls
    #[serde(default)]
    pub resilience: ResilienceConfig,

    /// Health probe settings
    #[serde(default)]
    pub probes: ProbeConfig,
}

/// Data platform connection settings
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PlatformConfig {
    /// Base URL of the data platform project
    #[serde(default)]
    pub url: String,

    /// Service role key sent as the bearer token
    #[serde(default)]
    pub service_key: String,

    /// Public API key sent in the `apikey` header; the service key is used when absent
    #[serde(default)]
    pub anon_key: Option<String>,

    /// HTTP client timeout in milliseconds
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,

    /// Path probed by the dependency health check
    #[serde(default = "default_status_path")]
    pub status_path: String,
}

fn default_port() -> u16 {
    8000
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_request_timeout_ms() -> u64 {
    10_000
}

fn default_status_path() -> String {
    "/rest/v1/".to_string()
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
            bind_address: default_host(),
            log_level: default_log_level(),
            json_logs: false,
            platform: PlatformConfig::default(),
            resilience: ResilienceConfig::default(),
            probes: ProbeConfig::default(),
        }
    }
}

impl ServerConfig {
    /// Load configuration from the optional config file and environment variables
    pub fn load() -> ServerResult<Self> {
        let mut builder = Config::builder();

        for (key, var) in [
            ("platform.url", "SUPABASE_URL"),
            ("platform.service_key", "SUPABASE_SERVICE_ROLE_KEY"),
            ("platform.anon_key", "SUPABASE_KEY"),
        ] {
            if let Ok(value) = env::var(var) {
                builder = builder.set_default(key, value)?;
            }
        }

        if let Ok(path) = env::var("USERBRIDGE_CONFIG") {
            builder = builder.add_source(File::with_name(&path));
        }

        builder = builder.add_source(
            Environment::with_prefix("USERBRIDGE")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );

        Self::from_builder(builder)
    }

    /// Build and validate a configuration from prepared sources
    pub fn from_builder(builder: ConfigBuilder<DefaultState>) -> ServerResult<Self> {
        let config: ServerConfig = builder.build()?.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    /// Check required fields and the bounds of nested settings
    pub fn validate(&self) -> ServerResult<()> {
        if self.platform.url.trim().is_empty() {
            return Err(ServerError::ConfigError(
                "Data platform URL is required".to_string(),
            ));
        }

        if reqwest::Url::parse(&self.platform.url).is_err() {
            return Err(ServerError::ConfigError(format!(
                "Data platform URL is not a valid URL: {}",
                self.platform.url
            )));
        }

        if self.platform.service_key.trim().is_empty() {
            return Err(ServerError::ConfigError(
                "Data platform service key is required".to_string(),
            ));
        }

        self.resilience.retry_policy()?;
        self.resilience.circuit_breaker_config().validate()?;
        self.probes.cpu_probe()?;
        self.probes.disk_probe()?;

        // Add warnings for missing optional fields
        if self.platform.anon_key.is_none() {
            warn!("No data platform anon key configured, sending the service key as apikey");
        }

        Ok(())
    }
}
