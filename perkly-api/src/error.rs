use axum::{
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use perkly_core::{EngineError, ValidationError};
use serde_json::json;

#[derive(Debug)]
pub enum AppError {
    ValidationError(String),
    MalformedRequest(StatusCode, String),
    ConflictError(String),
    RateLimited,
    DeadlineExceeded,
    InternalServerError(String),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_message) = match self {
            AppError::ValidationError(msg) => (StatusCode::BAD_REQUEST, msg),
            AppError::MalformedRequest(status, msg) => (status, msg),
            AppError::ConflictError(msg) => (StatusCode::CONFLICT, msg),
            AppError::RateLimited => (
                StatusCode::TOO_MANY_REQUESTS,
                "Rate limit exceeded".to_string(),
            ),
            AppError::DeadlineExceeded => (
                StatusCode::GATEWAY_TIMEOUT,
                "Eligibility evaluation timed out".to_string(),
            ),
            AppError::InternalServerError(msg) => {
                tracing::error!("Internal Server Error: {}", msg);
                (StatusCode::INTERNAL_SERVER_ERROR, "Internal Server Error".to_string())
            }
        };

        let body = Json(json!({
            "error": error_message,
        }));

        (status, body).into_response()
    }
}

impl From<EngineError> for AppError {
    fn from(err: EngineError) -> Self {
        match err {
            EngineError::Validation(e) => AppError::ValidationError(e.to_string()),
            EngineError::DuplicateTransaction(id) => {
                AppError::ConflictError(format!("duplicate transaction id: {}", id))
            }
            EngineError::StorageUnavailable(source) => {
                AppError::InternalServerError(format!("storage unavailable: {}", source))
            }
            EngineError::DeadlineExceeded => AppError::DeadlineExceeded,
        }
    }
}

impl From<ValidationError> for AppError {
    fn from(err: ValidationError) -> Self {
        AppError::ValidationError(err.to_string())
    }
}

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        // Oversized bodies keep their 413; every other rejection is the caller's malformed JSON.
        let status = if rejection.status() == StatusCode::PAYLOAD_TOO_LARGE {
            StatusCode::PAYLOAD_TOO_LARGE
        } else {
            StatusCode::BAD_REQUEST
        };
        AppError::MalformedRequest(status, rejection.body_text())
    }
}
