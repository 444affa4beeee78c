use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

/// Core session error taxonomy.
///
/// Retrieval and summarization failures are recoverable enrichment failures;
/// the driver degrades and the turn proceeds. A primary model failure is fatal
/// to the turn, and a transcript write failure is always fatal, since a
/// silently lost entry would break the session monitor's accounting.
#[derive(Error, Debug)]
pub enum SessionError {
    #[error("retrieval failed: {0}")]
    Retrieval(#[source] anyhow::Error),

    #[error("assistant summarization failed: {0}")]
    Summarization(#[source] anyhow::Error),

    #[error("primary model invocation failed: {0}")]
    ModelInvocation(#[source] anyhow::Error),

    #[error("transcript write failed: {0}")]
    LogWrite(#[source] std::io::Error),

    #[error("prompt template unavailable: {0}")]
    Template(#[source] std::io::Error),
}

impl SessionError {
    /// Recoverable errors degrade the turn instead of aborting it.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Self::Retrieval(_) | Self::Summarization(_))
    }
}

#[derive(Error, Debug)]
pub enum ApiError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Internal error: {0}")]
    InternalError(String),

    #[error("LLM error: {0}")]
    LlmError(String),
}

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
    message: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error_type, message) = match self {
            ApiError::NotFound(msg) => {
                tracing::warn!("Not found: {}", msg);
                (StatusCode::NOT_FOUND, "NotFound", msg)
            }
            ApiError::BadRequest(msg) => {
                tracing::warn!("Bad request: {}", msg);
                (StatusCode::BAD_REQUEST, "BadRequest", msg)
            }
            ApiError::InternalError(msg) => {
                tracing::error!("Internal error: {}", msg);
                (StatusCode::INTERNAL_SERVER_ERROR, "InternalError", msg)
            }
            ApiError::LlmError(msg) => {
                tracing::error!("LLM error: {}", msg);
                (StatusCode::SERVICE_UNAVAILABLE, "LlmError", msg)
            }
        };

        let body = Json(ErrorResponse {
            error: error_type.to_string(),
            message,
        });

        (status, body).into_response()
    }
}

impl From<SessionError> for ApiError {
    fn from(err: SessionError) -> Self {
        match err {
            SessionError::ModelInvocation(e) => ApiError::LlmError(e.to_string()),
            other => ApiError::InternalError(other.to_string()),
        }
    }
}
