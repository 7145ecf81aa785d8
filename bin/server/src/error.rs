//! API error types for the HTTP surface.
//!
//! Every known failure is recovered into a structured JSON response:
//! validation and resume failures are client errors with an `{error}` body,
//! and anything unexpected becomes a 500 carrying a generic message plus the
//! request parameters as correlation data. Raw internals never reach the
//! caller.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::{Value as JsonValue, json};
use std::fmt;

/// Errors returned by the API handlers.
#[derive(Debug)]
pub enum ApiError {
    /// The request carried no query parameters at all.
    InvalidRequest,
    /// The `taskToken` parameter is absent.
    MissingToken,
    /// The `action` parameter is absent or unrecognized.
    InvalidAction,
    /// The resume signal was rejected (stale, unknown, or consumed token).
    ResumeRejected { reason: String },
    /// Unexpected internal failure; `event` echoes the request parameters
    /// for correlation.
    Internal { event: JsonValue },
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidRequest => write!(f, "invalid query parameters"),
            Self::MissingToken => write!(f, "missing task token"),
            Self::InvalidAction => write!(f, "invalid action"),
            Self::ResumeRejected { reason } => write!(f, "resume rejected: {reason}"),
            Self::Internal { .. } => write!(f, "internal error"),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, body) = match self {
            Self::InvalidRequest => (
                StatusCode::BAD_REQUEST,
                json!({ "error": "Invalid query parameters" }),
            ),
            Self::MissingToken => (
                StatusCode::BAD_REQUEST,
                json!({ "error": "The token is required" }),
            ),
            Self::InvalidAction => (StatusCode::BAD_REQUEST, json!({ "error": "Invalid action" })),
            Self::ResumeRejected { reason } => {
                (StatusCode::BAD_REQUEST, json!({ "error": reason }))
            }
            Self::Internal { event } => (
                StatusCode::INTERNAL_SERVER_ERROR,
                json!({ "error": "Internal server error", "event": event }),
            ),
        };

        (status, Json(body)).into_response()
    }
}
