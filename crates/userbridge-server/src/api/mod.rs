//! API module for the Userbridge Server
//!
//! This module contains the API routes and handlers.

use axum::{routing::get, Router};
use std::sync::Arc;
use tower_http::trace::TraceLayer;

pub mod errors;
pub mod health;
pub mod users;

use crate::server::BridgeServer;

/// Build the router for API endpoints
pub fn build_router(server: Arc<BridgeServer>) -> Router {
    Router::new()
        // Users
        .route("/users/:user_id", get(users::get_user).put(users::update_user))
        // Health checks
        .route("/health", get(health::health_check))
        .route("/health/cpu", get(health::cpu_health))
        .route("/health/disk", get(health::disk_health))
        .layer(TraceLayer::new_for_http())
        // Shared state
        .with_state(server)
}
