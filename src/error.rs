//! # error
//!
//! Centralised error types.
//!
//! [`FeedError`] describes malformed upstream input (a tick or prediction
//! that cannot be parsed).  It is contained at the route boundary: the frame
//! is logged and dropped, the engine never sees it.
//!
//! [`AppError`] is what every handler returns.  Axum's `IntoResponse` impl
//! turns it into a structured JSON body so relays always get a
//! machine-readable answer, even on failure.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum FeedError {
    #[error("missing field '{0}'")]
    MissingField(&'static str),

    #[error("invalid field '{field}': {reason}")]
    InvalidField {
        field:  &'static str,
        reason: String,
    },
}

#[derive(Debug, Error)]
pub enum AppError {
    /// The payload was valid JSON but not a usable tick/prediction.
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// The strategy actor has stopped (shutdown in progress).
    #[error("Strategy engine unavailable")]
    EngineUnavailable,
}

impl From<FeedError> for AppError {
    fn from(err: FeedError) -> Self {
        AppError::BadRequest(err.to_string())
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            AppError::EngineUnavailable => (StatusCode::SERVICE_UNAVAILABLE, self.to_string()),
        };

        let body = Json(json!({
            "ok":    false,
            "error": message,
        }));

        (status, body).into_response()
    }
}
