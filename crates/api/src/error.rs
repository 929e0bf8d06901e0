//! API error types with HTTP response mapping.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use domain::DomainError;
use saga::SagaError;
use store::StoreError;

/// API-level error type that maps to HTTP responses.
#[derive(Debug)]
pub enum ApiError {
    /// Resource not found.
    NotFound(String),
    /// Bad request from the client.
    BadRequest(String),
    /// Saga execution error.
    Saga(SagaError),
    /// Store error.
    Store(StoreError),
    /// Internal server error.
    Internal(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            ApiError::Saga(err) => saga_error_to_response(err),
            ApiError::Store(err) => store_error_to_response(err),
            ApiError::Internal(msg) => {
                tracing::error!(error = %msg, "internal server error");
                (StatusCode::INTERNAL_SERVER_ERROR, msg)
            }
        };

        let body = serde_json::json!({ "error": message });
        (status, axum::Json(body)).into_response()
    }
}

fn saga_error_to_response(err: SagaError) -> (StatusCode, String) {
    match &err {
        SagaError::Validation(_) => (StatusCode::BAD_REQUEST, err.to_string()),
        SagaError::UserNotFound(_) => (StatusCode::NOT_FOUND, err.to_string()),
        SagaError::Gateway(_) | SagaError::Issuing(_) | SagaError::Automation(_) => {
            (StatusCode::BAD_GATEWAY, err.to_string())
        }
        SagaError::Store(store_err) => store_error_ref_to_response(store_err, &err),
        SagaError::Domain(_) => (StatusCode::CONFLICT, err.to_string()),
    }
}

fn store_error_to_response(err: StoreError) -> (StatusCode, String) {
    store_error_ref_to_response(&err, &err)
}

fn store_error_ref_to_response(
    err: &StoreError,
    display: &dyn std::fmt::Display,
) -> (StatusCode, String) {
    match err {
        StoreError::OrderNotFound(_) | StoreError::UserNotFound(_) => {
            (StatusCode::NOT_FOUND, display.to_string())
        }
        StoreError::Domain(DomainError::InvalidStatusTransition { .. }) => {
            (StatusCode::CONFLICT, display.to_string())
        }
        _ => (StatusCode::INTERNAL_SERVER_ERROR, display.to_string()),
    }
}

impl From<SagaError> for ApiError {
    fn from(err: SagaError) -> Self {
        ApiError::Saga(err)
    }
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        ApiError::Store(err)
    }
}
