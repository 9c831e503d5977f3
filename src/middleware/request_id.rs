//! Per-request correlation IDs
//!
//! One chat turn fans out into up to three auxiliary LLM calls plus the
//! backend dispatch; a single correlation id ties their log lines together
//! (the chat handler opens a tracing span carrying it around the routing
//! pipeline). Chat clients often already carry their own id, so an inbound
//! `x-request-id` header is honored when it parses as a UUID; otherwise a
//! fresh one is generated. The id is echoed on the response either way.

use axum::{extract::Request, http::HeaderValue, middleware::Next, response::Response};
use uuid::Uuid;

/// Request ID header name
pub const REQUEST_ID_HEADER: &str = "x-request-id";

/// Request ID wrapper type for Axum extensions
#[derive(Debug, Clone, Copy)]
pub struct RequestId(Uuid);

impl RequestId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Parse a client-supplied header value. Anything that is not a UUID is
    /// rejected so a malformed or hostile header cannot pollute log
    /// correlation.
    fn from_header(value: &HeaderValue) -> Option<Self> {
        value
            .to_str()
            .ok()
            .and_then(|v| Uuid::parse_str(v.trim()).ok())
            .map(Self)
    }
}

impl Default for RequestId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for RequestId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Middleware that resolves the correlation id for a request (inbound
/// header or freshly generated), exposes it to handlers, and echoes it on
/// the response.
pub async fn request_id_middleware(mut request: Request, next: Next) -> Response {
    let request_id = request
        .headers()
        .get(REQUEST_ID_HEADER)
        .and_then(RequestId::from_header)
        .unwrap_or_default();

    request.extensions_mut().insert(request_id);

    let mut response = next.run(request).await;

    if let Ok(header_value) = HeaderValue::from_str(&request_id.to_string()) {
        response.headers_mut().insert(REQUEST_ID_HEADER, header_value);
    }

    response
}
