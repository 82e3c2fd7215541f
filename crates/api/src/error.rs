//! API error types with HTTP response mapping.

use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use orchestrator::{ApprovalError, OrchestratorError};

/// API-level error type that maps to HTTP responses.
///
/// Upstream and internal details are logged and replaced with a generic
/// message; callers never see raw processor or database errors.
#[derive(Debug)]
pub enum ApiError {
    /// Malformed identifier, missing field, or unparseable body.
    BadRequest(String),
    /// Resource not found.
    NotFound(String),
    /// The resource is not in a state that accepts the request.
    InvalidState(String),
    /// A decision was already delivered.
    AlreadyResolved(String),
    /// Someone is already waiting on this resource.
    Conflict(String),
    /// The caller is not on the operator allowlist.
    Forbidden(String),
    /// The payment processor or network failed.
    Upstream(String),
    /// Internal server error.
    Internal(String),
}

impl ApiError {
    fn kind(&self) -> &'static str {
        match self {
            ApiError::BadRequest(_) => "input",
            ApiError::NotFound(_) => "not_found",
            ApiError::InvalidState(_) => "invalid_state",
            ApiError::AlreadyResolved(_) => "already_resolved",
            ApiError::Conflict(_) => "already_pending",
            ApiError::Forbidden(_) => "forbidden",
            ApiError::Upstream(_) => "upstream",
            ApiError::Internal(_) => "internal",
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let kind = self.kind();
        metrics::counter!("api_errors_total", "kind" => kind).increment(1);
        let (status, message) = match self {
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            ApiError::InvalidState(msg) | ApiError::AlreadyResolved(msg) => {
                (StatusCode::BAD_REQUEST, msg)
            }
            ApiError::Conflict(msg) => (StatusCode::CONFLICT, msg),
            ApiError::Forbidden(msg) => (StatusCode::FORBIDDEN, msg),
            ApiError::Upstream(msg) => {
                tracing::error!(error = %msg, "upstream failure");
                (
                    StatusCode::BAD_GATEWAY,
                    "Payment processor unavailable, retry later".to_string(),
                )
            }
            ApiError::Internal(msg) => {
                tracing::error!(error = %msg, "internal server error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal server error".to_string(),
                )
            }
        };

        let body = serde_json::json!({ "error": message, "kind": kind });
        (status, axum::Json(body)).into_response()
    }
}

impl From<OrchestratorError> for ApiError {
    fn from(err: OrchestratorError) -> Self {
        match err {
            OrchestratorError::Input(_) => ApiError::BadRequest(err.to_string()),
            OrchestratorError::NotFound(_) => ApiError::NotFound(err.to_string()),
            OrchestratorError::InvalidState { .. } => ApiError::InvalidState(err.to_string()),
            OrchestratorError::Upstream(_) => ApiError::Upstream(err.to_string()),
            OrchestratorError::Store(_) => ApiError::Internal(err.to_string()),
        }
    }
}

impl From<ApprovalError> for ApiError {
    fn from(err: ApprovalError) -> Self {
        match err {
            ApprovalError::Input(_) => ApiError::BadRequest(err.to_string()),
            ApprovalError::NotFound(_) => ApiError::NotFound(err.to_string()),
            ApprovalError::AlreadyResolved(_) => ApiError::AlreadyResolved(err.to_string()),
            ApprovalError::AlreadyPending(_) => ApiError::Conflict(err.to_string()),
            ApprovalError::TimedOut(_) | ApprovalError::Interrupted(_) => {
                ApiError::InvalidState(err.to_string())
            }
            ApprovalError::Store(_) => ApiError::Internal(err.to_string()),
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::BadRequest(rejection.body_text())
    }
}
