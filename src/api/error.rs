//! Translation of domain errors into HTTP responses.
//!
//! Agents see compact JSON envelopes: `{"error": "...", "details": [...]}`.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

use crate::domain::errors::CoreError;

pub type ApiResult<T> = Result<T, ApiError>;

/// Wire-facing error wrapper.
#[derive(Debug)]
pub struct ApiError(pub CoreError);

#[derive(Serialize)]
struct ErrorEnvelope {
    error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<Vec<String>>,
}

impl ApiError {
    fn status(&self) -> StatusCode {
        match &self.0 {
            CoreError::NotFound { .. } | CoreError::HashNotFound => StatusCode::NOT_FOUND,
            CoreError::InvalidTransition { .. } | CoreError::Validation(_) => {
                StatusCode::UNPROCESSABLE_ENTITY
            }
            CoreError::AuthFailure => StatusCode::UNAUTHORIZED,
            CoreError::Conflict { .. } => StatusCode::CONFLICT,
            CoreError::Timeout(_) => StatusCode::GATEWAY_TIMEOUT,
            CoreError::Dependency(_) => StatusCode::SERVICE_UNAVAILABLE,
            CoreError::Database(_) | CoreError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        // Internal details stay in the logs, not on the wire.
        let message = if status == StatusCode::INTERNAL_SERVER_ERROR {
            tracing::error!(error = %self.0, "internal error");
            "internal error".to_string()
        } else {
            self.0.to_string()
        };
        let body = Json(ErrorEnvelope {
            error: message,
            details: None,
        });
        (status, body).into_response()
    }
}

impl From<CoreError> for ApiError {
    fn from(err: CoreError) -> Self {
        Self(err)
    }
}
