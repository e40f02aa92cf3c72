use axum::extract::rejection::JsonRejection;
use axum::http::header::RETRY_AFTER;
use axum::http::{HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use goldrush_core::error::CoreError;
use serde_json::json;

/// Seconds a client should wait before retrying after `QueueFull`.
pub const QUEUE_FULL_RETRY_AFTER_SECS: u64 = 5;

/// Application-level error type for HTTP handlers.
///
/// Wraps [`CoreError`] for domain errors and adds HTTP-specific variants.
/// Implements [`IntoResponse`] to produce consistent `{error, code}` JSON.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error(transparent)]
    Core(#[from] CoreError),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Internal error: {0}")]
    InternalError(String),
}

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        AppError::Core(CoreError::Validation(rejection.body_text()))
    }
}

/// Convenience type alias for handler return values.
pub type AppResult<T> = Result<T, AppError>;

fn internal() -> (StatusCode, &'static str, String) {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        "INTERNAL_ERROR",
        "An internal error occurred".to_string(),
    )
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let mut retry_after = None;

        let (status, code, message) = match &self {
            AppError::Core(core) => match core {
                CoreError::NotFound { entity, id } => (
                    StatusCode::NOT_FOUND,
                    "NOT_FOUND",
                    format!("{entity} with id {id} not found"),
                ),
                CoreError::Validation(msg) => {
                    (StatusCode::BAD_REQUEST, "VALIDATION_ERROR", msg.clone())
                }
                CoreError::Conflict(msg) => (StatusCode::CONFLICT, "CONFLICT", msg.clone()),
                CoreError::Unauthorized(msg) => {
                    (StatusCode::UNAUTHORIZED, "UNAUTHORIZED", msg.clone())
                }
                CoreError::Forbidden(msg) => (StatusCode::FORBIDDEN, "FORBIDDEN", msg.clone()),
                CoreError::InvalidPayload(msg) => {
                    (StatusCode::BAD_REQUEST, "INVALID_PAYLOAD", msg.clone())
                }
                CoreError::InsufficientBalance { .. } => (
                    StatusCode::BAD_REQUEST,
                    "INSUFFICIENT_BALANCE",
                    core.to_string(),
                ),
                CoreError::PlanLimitExceeded { .. } => (
                    StatusCode::TOO_MANY_REQUESTS,
                    "PLAN_LIMIT_EXCEEDED",
                    core.to_string(),
                ),
                CoreError::QueueFull { .. } => {
                    retry_after = Some(QUEUE_FULL_RETRY_AFTER_SECS);
                    (
                        StatusCode::SERVICE_UNAVAILABLE,
                        "QUEUE_FULL",
                        "The generation queue is full, retry later".to_string(),
                    )
                }
                CoreError::Internal(msg) => {
                    tracing::error!(error = %msg, "Internal core error");
                    internal()
                }
                CoreError::InvalidTransition { .. }
                | CoreError::StateMismatch { .. }
                | CoreError::ReservationNotFound(_)
                | CoreError::ReservationSettled { .. } => {
                    tracing::error!(error = %core, "Invariant violation");
                    internal()
                }
            },

            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "BAD_REQUEST", msg.clone()),
            AppError::InternalError(msg) => {
                tracing::error!(error = %msg, "Internal error");
                internal()
            }
        };

        let body = json!({
            "error": message,
            "code": code,
        });

        let mut response = (status, axum::Json(body)).into_response();
        if let Some(secs) = retry_after {
            response
                .headers_mut()
                .insert(RETRY_AFTER, HeaderValue::from(secs));
        }
        response
    }
}
