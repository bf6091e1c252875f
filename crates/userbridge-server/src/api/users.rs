//! User endpoints
//!
//! Both handlers run their data platform call through the server's resilient
//! executor and map the classified outcome onto the response.

use axum::{
    extract::{rejection::JsonRejection, Path, State},
    Json,
};
use std::sync::Arc;
use tracing::{debug, info};
use userbridge_core::{RawUserId, UserId};

use super::errors::ApiError;
use crate::models::{UpdateUserRequest, UpdatedUser, User, UserChange, UserUpdate};
use crate::server::BridgeServer;

/// `GET /users/:user_id`
pub async fn get_user(
    State(server): State<Arc<BridgeServer>>,
    Path(user_id): Path<String>,
) -> Result<Json<User>, ApiError> {
    debug!(%user_id, "Fetching user");
    let platform = server.platform().clone();

    let outcome = server
        .executor()
        .execute(RawUserId(user_id.clone()), |id: &UserId| {
            let platform = platform.clone();
            let id = *id;
            async move { platform.fetch_user(&id).await }
        })
        .await;

    match outcome.classify()? {
        Some(user) => Ok(Json(user)),
        None => Err(ApiError::NotFound(format!("No user found with ID {}.", user_id))),
    }
}

/// `PUT /users/:user_id`
pub async fn update_user(
    State(server): State<Arc<BridgeServer>>,
    Path(user_id): Path<String>,
    body: Result<Json<UserUpdate>, JsonRejection>,
) -> Result<Json<UpdatedUser>, ApiError> {
    let Json(changes) = body.map_err(|rejection| ApiError::BadRequest(rejection.body_text()))?;
    let platform = server.platform().clone();

    let request = UpdateUserRequest {
        id: user_id.clone(),
        changes,
    };

    let outcome = server
        .executor()
        .execute(request, |change: &UserChange| {
            let platform = platform.clone();
            let change = change.clone();
            async move { platform.update_user(&change.id, &change.changes).await }
        })
        .await;

    match outcome.classify()? {
        Some(updated) => {
            info!(%user_id, "User updated");
            Ok(Json(updated))
        }
        None => Err(ApiError::NotFound(format!("No user found with ID {}.", user_id))),
    }
}
