//! Health check endpoint
//!
//! Provides a simple liveness check for monitoring and load balancers.

use axum::{Json, http::StatusCode};
use serde::Serialize;

/// Health check response
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
}

/// Health check handler; the router is stateless, so liveness is the only
/// signal.
pub async fn handler() -> (StatusCode, Json<HealthResponse>) {
    (StatusCode::OK, Json(HealthResponse { status: "OK" }))
}
