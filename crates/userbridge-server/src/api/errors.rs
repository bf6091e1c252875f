//! Error handling for the Userbridge API
//!
//! Every error leaves the API as
//! `{ "error", "errorDetails": { "errorCode", "errorMessage" } }`.

use axum::{http::StatusCode, response::IntoResponse, Json};
use serde_json::json;
use userbridge_core::ClassifiedFailure;

/// API Error type for returning standard error responses
#[derive(Debug)]
pub enum ApiError {
    /// Bad request (400)
    BadRequest(String),
    /// Not found (404)
    NotFound(String),
    /// Classified failure of an upstream call
    Upstream(ClassifiedFailure),
}

impl From<ClassifiedFailure> for ApiError {
    fn from(failure: ClassifiedFailure) -> Self {
        ApiError::Upstream(failure)
    }
}

impl std::fmt::Display for ApiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ApiError::BadRequest(msg) => write!(f, "Bad Request: {}", msg),
            ApiError::NotFound(msg) => write!(f, "Not Found: {}", msg),
            ApiError::Upstream(failure) => write!(f, "{}", failure),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        let (status, error_code, message) = match self {
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "ERR_BAD_REQUEST", msg),
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, "ERR_NOT_FOUND", msg),
            ApiError::Upstream(failure) => {
                let status = StatusCode::from_u16(failure.category.status_code())
                    .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
                let message = failure
                    .detail
                    .unwrap_or_else(|| failure.category.to_string());
                (status, failure.category.error_code(), message)
            }
        };

        let body = Json(json!({
            "error": message,
            "errorDetails": {
                "errorCode": error_code,
                "errorMessage": message,
            }
        }));

        (status, body).into_response()
    }
}
