//! API error types with HTTP response mapping.

use auth::AuthError;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use store::StoreError;

/// API-level error type that maps to HTTP responses.
#[derive(Debug)]
pub enum ApiError {
    /// Bad request from the client, including illegal status
    /// transitions.
    BadRequest(String),
    /// Missing, expired, or malformed credentials.
    Unauthorized(String),
    /// Resource not found.
    NotFound(String),
    /// Rate limit bucket exhausted.
    RateLimited,
    /// Internal server error.
    Internal(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            ApiError::Unauthorized(msg) => (StatusCode::UNAUTHORIZED, msg),
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            ApiError::RateLimited => (
                StatusCode::TOO_MANY_REQUESTS,
                "rate limit exceeded".to_string(),
            ),
            ApiError::Internal(msg) => {
                tracing::error!(error = %msg, "internal server error");
                (StatusCode::INTERNAL_SERVER_ERROR, msg)
            }
        };

        let body = serde_json::json!({ "error": message });
        (status, axum::Json(body)).into_response()
    }
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        match &err {
            StoreError::OrderNotFound(_) => ApiError::NotFound(err.to_string()),
            StoreError::DuplicateEmail(_) => ApiError::BadRequest(err.to_string()),
            StoreError::Domain(_) => ApiError::BadRequest(err.to_string()),
            _ => ApiError::Internal(err.to_string()),
        }
    }
}

impl From<AuthError> for ApiError {
    fn from(err: AuthError) -> Self {
        match &err {
            AuthError::InvalidCredentials
            | AuthError::ExpiredToken
            | AuthError::InvalidToken => ApiError::Unauthorized(err.to_string()),
            AuthError::Validation(_) | AuthError::DuplicateEmail(_) => {
                ApiError::BadRequest(err.to_string())
            }
            _ => ApiError::Internal(err.to_string()),
        }
    }
}
