use crate::utils::error::RelayError;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;

/// Error type for HTTP handlers. Every variant renders as
/// `{"error": message, "code": CODE}`.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error(transparent)]
    Relay(#[from] RelayError),

    #[error("Bad request: {0}")]
    BadRequest(String),
}

pub type AppResult<T> = Result<T, AppError>;

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let mut details = None;
        let (status, code, message) = match &self {
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "BAD_REQUEST", msg.clone()),
            AppError::Relay(err) => match err {
                RelayError::ValidationError { message } => {
                    (StatusCode::BAD_REQUEST, "VALIDATION_ERROR", message.clone())
                }
                RelayError::NotFound { .. } => (StatusCode::NOT_FOUND, "NOT_FOUND", err.to_string()),
                RelayError::JobNotFinished { .. } => {
                    (StatusCode::CONFLICT, "JOB_NOT_FINISHED", err.to_string())
                }
                RelayError::AgentInvocationFailed { details: d } => {
                    details = Some(d.clone());
                    (
                        StatusCode::INTERNAL_SERVER_ERROR,
                        "AGENT_FAILED",
                        "Agent invocation failed".to_string(),
                    )
                }
                RelayError::AgentTimeout { .. } => {
                    (StatusCode::GATEWAY_TIMEOUT, "AGENT_TIMEOUT", err.to_string())
                }
                other => {
                    tracing::error!(error = %other, "Internal error");
                    (
                        StatusCode::INTERNAL_SERVER_ERROR,
                        "INTERNAL_ERROR",
                        "An internal error occurred".to_string(),
                    )
                }
            },
        };

        let body = match details {
            Some(details) => json!({ "error": message, "details": details, "code": code }),
            None => json!({ "error": message, "code": code }),
        };

        (status, axum::Json(body)).into_response()
    }
}
