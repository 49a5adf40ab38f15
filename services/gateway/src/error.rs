use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

/// Central error type for the gateway application
#[derive(Debug, Error)]
pub enum AppError {
    /// The worker did not report an outcome within the request timeout.
    /// The command may still be applied later; callers must treat the
    /// outcome as unknown, not as a failure.
    #[error("Timed out waiting for command result")]
    OutcomeUnknown,

    #[error("Command pipeline unavailable")]
    PipelineUnavailable,

    #[error("Internal server error")]
    InternalError(#[from] anyhow::Error),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_message, code) = match self {
            AppError::OutcomeUnknown => (
                StatusCode::GATEWAY_TIMEOUT,
                "command outcome unknown, it may still be applied".to_string(),
                "OUTCOME_UNKNOWN",
            ),
            AppError::PipelineUnavailable => (
                StatusCode::SERVICE_UNAVAILABLE,
                "command pipeline unavailable".to_string(),
                "PIPELINE_UNAVAILABLE",
            ),
            AppError::InternalError(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Internal server error".to_string(),
                "INTERNAL_ERROR",
            ),
        };

        let body = Json(json!({
            "error": code,
            "message": error_message
        }));

        (status, body).into_response()
    }
}
