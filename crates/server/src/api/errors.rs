//! API error types mapped to HTTP status codes.
//!
//! Each [`ApiError`] variant maps to a specific HTTP status code and produces a JSON
//! body `{"status": {"error": "message"}, "time": 0.0}`.

use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use multivec_core::Error;
use serde_json::json;

/// Application-level error type that implements `IntoResponse`.
///
/// - `NotFound` → 404
/// - `BadRequest` → 400
/// - `Conflict` → 409
/// - `Internal` → 500
#[derive(Debug)]
pub enum ApiError {
    NotFound(String),
    BadRequest(String),
    Conflict(String),
    Internal(String),
}

impl From<Error> for ApiError {
    fn from(err: Error) -> Self {
        let message = err.to_string();
        match err {
            Error::CollectionNotFound(_) => ApiError::NotFound(message),
            Error::CollectionExists(_) => ApiError::Conflict(message),
            Error::DuplicateVectorSpace(_)
            | Error::UnknownVectorSpace(_)
            | Error::DimensionMismatch { .. }
            | Error::InvalidQuantizationParams(_)
            | Error::InvalidHnswParams(_)
            | Error::InvalidSchema(_)
            | Error::InvalidVector { .. }
            | Error::InvalidRequest(_) => ApiError::BadRequest(message),
            Error::BuildFailed(_) | Error::StaleConfigRace(_) | Error::Storage(_) => {
                ApiError::Internal(message)
            }
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::BadRequest(rejection.body_text())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            ApiError::Conflict(msg) => (StatusCode::CONFLICT, msg),
            ApiError::Internal(msg) => {
                tracing::error!(error = %msg, "request failed");
                (StatusCode::INTERNAL_SERVER_ERROR, msg)
            }
        };
        let body = axum::Json(json!({ "status": { "error": message }, "time": 0.0 }));
        (status, body).into_response()
    }
}
