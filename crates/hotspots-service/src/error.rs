use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use thiserror::Error;

/// Errors raised by the aggregates service's storage layer.
#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("request parameters were invalid: {0}")]
    InvalidParams(String),

    #[error("storage backend error: {0}")]
    Storage(#[from] anyhow::Error),
}

/// HTTP-facing error wrapper: carries the status code to render alongside
/// an opaque `anyhow::Error`, following the same split as the rest of the
/// stack (typed errors internally, one erased type at the boundary).
pub struct AppError {
    status: StatusCode,
    error: anyhow::Error,
}

impl AppError {
    pub fn with_status(status: StatusCode, error: impl Into<anyhow::Error>) -> Self {
        Self {
            status,
            error: error.into(),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        tracing::error!(error = %self.error, status = %self.status, "request failed");
        (self.status, Json(json!({ "error": self.error.to_string() }))).into_response()
    }
}

impl From<ServiceError> for AppError {
    fn from(e: ServiceError) -> Self {
        let status = match &e {
            ServiceError::InvalidParams(_) => StatusCode::UNPROCESSABLE_ENTITY,
            ServiceError::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        Self {
            status,
            error: e.into(),
        }
    }
}

impl From<anyhow::Error> for AppError {
    fn from(error: anyhow::Error) -> Self {
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            error,
        }
    }
}
