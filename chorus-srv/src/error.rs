//! Error types for chorus-srv
//!
//! Core errors map onto HTTP status codes. Unexpected failures answer with a
//! generic message; the full text rides along in a response extension and is
//! only written into the body when the service runs in dev mode.

use axum::{
    extract::{Request, State},
    http::StatusCode,
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;
use tracing::error;

use crate::AppState;

/// Message returned for 500 responses outside dev mode
pub const GENERIC_INTERNAL_MESSAGE: &str = "Internal server error";

/// API error type
#[derive(Debug, Error)]
pub enum ApiError {
    /// Resource not found (404)
    #[error("Resource not found: {0}")]
    NotFound(String),

    /// Invalid request (400)
    #[error("Invalid request: {0}")]
    BadRequest(String),

    /// Missing caller identity (401)
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// Caller lacks the capability (403)
    #[error("Forbidden: {0}")]
    Forbidden(String),

    /// Internal server error (500); the detail is never shown outside dev mode
    #[error("Internal server error: {0}")]
    Internal(String),
}

impl From<chorus_common::Error> for ApiError {
    fn from(err: chorus_common::Error) -> Self {
        use chorus_common::Error;

        match err {
            Error::NotFound(msg) => ApiError::NotFound(msg),
            Error::Validation(msg) => ApiError::BadRequest(msg),
            Error::Forbidden(msg) => ApiError::Forbidden(msg),
            other => ApiError::Internal(other.to_string()),
        }
    }
}

/// Full text of an internal error, attached to the response
#[derive(Debug, Clone)]
pub struct ErrorDetail(pub String);

fn error_body(code: &str, message: &str) -> Json<serde_json::Value> {
    Json(json!({
        "error": {
            "code": code,
            "message": message,
        }
    }))
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code, message) = match self {
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, "NOT_FOUND", msg),
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "BAD_REQUEST", msg),
            ApiError::Unauthorized(msg) => (StatusCode::UNAUTHORIZED, "UNAUTHORIZED", msg),
            ApiError::Forbidden(msg) => (StatusCode::FORBIDDEN, "FORBIDDEN", msg),
            ApiError::Internal(detail) => {
                error!("Request failed: {}", detail);
                let mut response = (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    error_body("INTERNAL_ERROR", GENERIC_INTERNAL_MESSAGE),
                )
                    .into_response();
                response.extensions_mut().insert(ErrorDetail(detail));
                return response;
            }
        };

        (status, error_body(code, &message)).into_response()
    }
}

/// Rewrite 500 bodies with the full error text when dev mode is on
pub async fn expose_error_detail(State(state): State<AppState>, request: Request, next: Next) -> Response {
    let response = next.run(request).await;
    if !state.config.dev_mode {
        return response;
    }

    match response.extensions().get::<ErrorDetail>().cloned() {
        Some(ErrorDetail(detail)) => (
            response.status(),
            error_body("INTERNAL_ERROR", &detail),
        )
            .into_response(),
        None => response,
    }
}

/// Result type for API handlers
pub type ApiResult<T> = Result<T, ApiError>;
