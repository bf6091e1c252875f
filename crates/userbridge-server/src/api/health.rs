//! Health check endpoints for the Userbridge Server

use axum::{extract::State, http::StatusCode, Json};
use std::sync::Arc;
use tracing::info;
use userbridge_core::HealthResponse;

use super::errors::ApiError;
use crate::server::BridgeServer;

/// 200 when UP, 503 when DOWN
fn respond(response: HealthResponse) -> (StatusCode, Json<HealthResponse>) {
    let status = if response.status.is_up() {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    (status, Json(response))
}

async fn component(server: &BridgeServer, name: &str) -> Result<(StatusCode, Json<HealthResponse>), ApiError> {
    server
        .health()
        .check_one(name)
        .await
        .map(respond)
        .ok_or_else(|| ApiError::NotFound(format!("Health component {} is not registered", name)))
}

/// `GET /health`: every registered probe
pub async fn health_check(
    State(server): State<Arc<BridgeServer>>,
) -> (StatusCode, Json<HealthResponse>) {
    let response = server.health().check_all().await;
    info!(status = %response.status, "Health check requested");
    respond(response)
}

/// `GET /health/cpu`
pub async fn cpu_health(
    State(server): State<Arc<BridgeServer>>,
) -> Result<(StatusCode, Json<HealthResponse>), ApiError> {
    component(&server, "cpu").await
}

/// `GET /health/disk`
pub async fn disk_health(
    State(server): State<Arc<BridgeServer>>,
) -> Result<(StatusCode, Json<HealthResponse>), ApiError> {
    component(&server, "disk").await
}
