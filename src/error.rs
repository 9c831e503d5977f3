//! Error types for Promptgate
//!
//! Only errors that should reach the client live here; auxiliary LLM and
//! registry failures degrade inside their components (see `upstream`) and
//! never cross the handler boundary.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error;

/// Main error type for the application
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid request: {0}")]
    Validation(String),

    /// The backend rejected the dispatched request. The original status and
    /// body are surfaced to the caller unchanged.
    #[error("Backend dispatch failed with status {status}")]
    Dispatch { status: u16, body: String },

    #[error("Internal error: {0}")]
    Internal(String),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        match self {
            Self::Validation(msg) => error_response(StatusCode::BAD_REQUEST, &msg),
            Self::Config(msg) => error_response(StatusCode::INTERNAL_SERVER_ERROR, &msg),
            Self::Dispatch { status, body } => {
                let status = StatusCode::from_u16(status)
                    .unwrap_or(StatusCode::BAD_GATEWAY);
                // Pass backend error bodies through when they are JSON,
                // wrap them otherwise.
                match serde_json::from_str::<serde_json::Value>(&body) {
                    Ok(json) => (status, Json(json)).into_response(),
                    Err(_) => error_response(status, &body),
                }
            }
            Self::Internal(msg) => error_response(StatusCode::INTERNAL_SERVER_ERROR, &msg),
        }
    }
}

fn error_response(status: StatusCode, message: &str) -> Response {
    let body = Json(serde_json::json!({
        "error": message,
    }));
    (status, body).into_response()
}

/// Convenience type alias for Results
pub type AppResult<T> = Result<T, AppError>;
