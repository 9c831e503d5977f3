//! Chat completions endpoint
//!
//! Handles POST /chat/completions: routes the turn through the orchestrator
//! and either dispatches to the backend (unary or streaming) or returns a
//! model recommendation without dispatching.

use std::convert::Infallible;
use std::time::Duration;

use axum::{
    Extension, Json,
    extract::State,
    http::{HeaderMap, StatusCode, header},
    response::{
        IntoResponse, Response,
        sse::{Event, KeepAlive, Sse},
    },
};
use futures::{StreamExt, future};
use tracing::Instrument;

use crate::error::AppError;
use crate::handlers::AppState;
use crate::handlers::types::ChatRequest;
use crate::middleware::RequestId;
use crate::router::RoutingOutcome;
use crate::upstream::UpstreamError;
use crate::upstream::dispatch::is_terminal_event;

/// POST /chat/completions handler
pub async fn handler(
    State(state): State<AppState>,
    Extension(request_id): Extension<RequestId>,
    headers: HeaderMap,
    Json(request): Json<ChatRequest>,
) -> Result<Response, AppError> {
    tracing::debug!(
        request_id = %request_id,
        model = %request.model,
        messages = request.messages.len(),
        stream = request.stream,
        "received chat completions request"
    );

    let bearer = bearer_token(&headers);

    // The routing span carries the correlation id into every auxiliary
    // call's log lines (classifier, selector, enhancer, registry).
    let routing_span = tracing::info_span!("routing", request_id = %request_id);
    let outcome = state
        .orchestrator()
        .route(request, bearer.as_deref())
        .instrument(routing_span)
        .await;

    match outcome {
        RoutingOutcome::Recommend(envelope) => {
            tracing::info!(
                request_id = %request_id,
                recommended = %envelope.recommended_model,
                "returning recommendation instead of dispatching"
            );
            Ok(Json(*envelope).into_response())
        }
        RoutingOutcome::Forward(outgoing) => {
            let stream = outgoing.stream;
            let payload = serde_json::to_value(&outgoing).map_err(|e| {
                AppError::Internal(format!("failed to serialize outgoing request: {}", e))
            })?;

            if stream {
                stream_dispatch(&state, &payload, bearer.as_deref(), request_id).await
            } else {
                unary_dispatch(&state, &payload, bearer.as_deref(), request_id).await
            }
        }
    }
}

/// Extract the bearer token from the inbound Authorization header.
fn bearer_token(headers: &HeaderMap) -> Option<String> {
    headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::to_string)
}

async fn unary_dispatch(
    state: &AppState,
    payload: &serde_json::Value,
    bearer: Option<&str>,
    request_id: RequestId,
) -> Result<Response, AppError> {
    let response = state
        .dispatcher()
        .dispatch(payload, bearer)
        .await
        .map_err(|e| dispatch_error(e, request_id))?;

    // Relay the backend's status and body unchanged.
    let status = StatusCode::from_u16(response.status).unwrap_or(StatusCode::BAD_GATEWAY);
    if !status.is_success() {
        tracing::warn!(
            request_id = %request_id,
            status = response.status,
            "backend rejected dispatched request"
        );
    }
    Ok((status, Json(response.body)).into_response())
}

async fn stream_dispatch(
    state: &AppState,
    payload: &serde_json::Value,
    bearer: Option<&str>,
    request_id: RequestId,
) -> Result<Response, AppError> {
    let events = state
        .dispatcher()
        .dispatch_stream(payload, bearer)
        .await
        .map_err(|e| dispatch_error(e, request_id))?;

    // Proxy backend events verbatim, closing after the terminal event.
    let stream = events.scan(false, move |closed, item| {
        if *closed {
            return future::ready(None);
        }

        let event: Result<Event, Infallible> = match item {
            Ok(data) => {
                if is_terminal_event(&data) {
                    *closed = true;
                }
                Ok(Event::default().data(data))
            }
            Err(e) => {
                *closed = true;
                tracing::error!(
                    request_id = %request_id,
                    error = %e,
                    "backend stream error, terminating"
                );
                Ok(Event::default().data(
                    serde_json::json!({
                        "error": format!("stream interrupted: {}", e),
                        "done": true,
                    })
                    .to_string(),
                ))
            }
        };
        future::ready(Some(event))
    });

    Ok(Sse::new(stream)
        .keep_alive(KeepAlive::new().interval(Duration::from_secs(15)).text(":"))
        .into_response())
}

fn dispatch_error(error: UpstreamError, request_id: RequestId) -> AppError {
    tracing::error!(
        request_id = %request_id,
        error = %error,
        "backend dispatch failed"
    );
    match error {
        UpstreamError::Status { status, body } => AppError::Dispatch { status, body },
        other => AppError::Dispatch {
            status: 502,
            body: format!("backend unreachable: {}", other),
        },
    }
}
