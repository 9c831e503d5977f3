//! Backend dispatcher
//!
//! Forwards the conditioned request to the backend pool, either as a unary
//! call whose response is relayed with its original status, or as an SSE
//! stream whose events are proxied verbatim until the terminal event.

use std::pin::Pin;
use std::time::Duration;

use async_trait::async_trait;
use eventsource_stream::Eventsource;
use futures::stream::{Stream, StreamExt};
use serde_json::Value;

use super::UpstreamError;

/// Unary backend response: original status plus JSON body
#[derive(Debug, Clone)]
pub struct DispatchResponse {
    pub status: u16,
    pub body: Value,
}

/// Raw SSE event payloads from the backend, in arrival order
pub type EventStream = Pin<Box<dyn Stream<Item = Result<String, UpstreamError>> + Send>>;

/// Seam for the backend pool.
#[async_trait]
pub trait Dispatcher: Send + Sync {
    /// Forward a unary chat completion. Non-2xx backend responses are
    /// returned as values, not errors - the caller relays the status.
    async fn dispatch(
        &self,
        payload: &Value,
        bearer: Option<&str>,
    ) -> Result<DispatchResponse, UpstreamError>;

    /// Forward a streaming chat completion and return the backend's event
    /// payloads verbatim.
    async fn dispatch_stream(
        &self,
        payload: &Value,
        bearer: Option<&str>,
    ) -> Result<EventStream, UpstreamError>;
}

/// True when an SSE payload is the backend's terminal event.
///
/// Terminal events are the literal `[DONE]` sentinel, a JSON object with
/// `done == true`, or a JSON object with a terminal `status`.
pub fn is_terminal_event(data: &str) -> bool {
    let trimmed = data.trim();
    if trimmed == "[DONE]" {
        return true;
    }

    let Ok(value) = serde_json::from_str::<Value>(trimmed) else {
        return false;
    };
    if value.get("done").and_then(Value::as_bool) == Some(true) {
        return true;
    }
    matches!(
        value.get("status").and_then(Value::as_str),
        Some("succeeded") | Some("failed") | Some("timeout")
    )
}

/// HTTP dispatcher for the backend pool
#[derive(Debug, Clone)]
pub struct HttpDispatcher {
    client: reqwest::Client,
    base_url: String,
    timeout: Duration,
}

impl HttpDispatcher {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into(),
            timeout,
        }
    }

    fn completions_url(&self) -> String {
        format!("{}/chat/completions", self.base_url.trim_end_matches('/'))
    }
}

#[async_trait]
impl Dispatcher for HttpDispatcher {
    async fn dispatch(
        &self,
        payload: &Value,
        bearer: Option<&str>,
    ) -> Result<DispatchResponse, UpstreamError> {
        let mut request = self
            .client
            .post(self.completions_url())
            .timeout(self.timeout)
            .json(payload);
        if let Some(token) = bearer {
            request = request.bearer_auth(token);
        }

        let response = request.send().await?;
        let status = response.status().as_u16();
        let text = response.text().await?;
        let body = serde_json::from_str(&text)
            .unwrap_or_else(|_| Value::String(text));

        Ok(DispatchResponse { status, body })
    }

    async fn dispatch_stream(
        &self,
        payload: &Value,
        bearer: Option<&str>,
    ) -> Result<EventStream, UpstreamError> {
        let mut request = self
            .client
            .post(self.completions_url())
            .timeout(self.timeout)
            .json(payload);
        if let Some(token) = bearer {
            request = request.bearer_auth(token);
        }

        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(UpstreamError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let events = response.bytes_stream().eventsource().map(|result| {
            result.map(|event| event.data).map_err(|e| {
                UpstreamError::Status {
                    status: 502,
                    body: format!("SSE stream error: {}", e),
                }
            })
        });

        Ok(Box::pin(events))
    }
}
