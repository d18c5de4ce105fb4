//! API Error Handling
//!
//! Unified error type and conversion for API responses. Every error body is
//! `{"error": message}`.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use tarmac_core::dto::deploy::ErrorResponse;

/// API error type
#[derive(Debug)]
pub enum ApiError {
    NotFound(String),
    BadRequest(String),
    /// `message` is returned to the client, `detail` is only logged
    Internal {
        message: &'static str,
        detail: String,
    },
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            ApiError::Internal { message, detail } => {
                tracing::error!("Internal error: {}", detail);
                (StatusCode::INTERNAL_SERVER_ERROR, message.to_string())
            }
        };

        (status, Json(ErrorResponse { error: message })).into_response()
    }
}

pub type ApiResult<T> = Result<T, ApiError>;
