//! Data platform abstraction
//!
//! The server talks to the data platform only through [`DataPlatform`]; the
//! HTTP implementation lives in [`http`].

use async_trait::async_trait;
use std::fmt::Debug;
use std::sync::Arc;
use userbridge_core::health::probes::StatusCheck;
use userbridge_core::{ProbeError, RemoteError, UserId};

use crate::models::{UpdatedUser, User, UserUpdate};

pub mod http;

pub use http::HttpDataPlatform;

/// User operations offered by the data platform
#[async_trait]
pub trait DataPlatform: Send + Sync + Debug {
    /// Fetch one user; `None` when no record matches
    async fn fetch_user(&self, id: &UserId) -> Result<Option<User>, RemoteError>;

    /// Apply a partial update; `None` when no record matched
    async fn update_user(
        &self,
        id: &UserId,
        changes: &UserUpdate,
    ) -> Result<Option<UpdatedUser>, RemoteError>;

    /// Lightweight authenticated status request
    async fn status(&self) -> Result<(), ProbeError>;
}

/// Exposes a data platform to the dependency health probe
#[derive(Debug, Clone)]
pub struct PlatformStatus(pub Arc<dyn DataPlatform>);

#[async_trait]
impl StatusCheck for PlatformStatus {
    async fn status(&self) -> Result<(), ProbeError> {
        self.0.status().await
    }
}
