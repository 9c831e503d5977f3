//! Upstream HTTP clients
//!
//! One pooled client per upstream: the auxiliary LLM endpoint (classifier,
//! selector, enhancer), the model registry, and the backend dispatcher.
//! Each client is behind a trait so the orchestrator can be tested without
//! a network.

pub mod dispatch;
pub mod llm;
pub mod registry;

pub use dispatch::{DispatchResponse, Dispatcher, HttpDispatcher};
pub use llm::{AuxChatCall, AuxLlmClient, JsonCompletionBackend};
pub use registry::{HttpModelRegistry, ModelDescriptor, ModelRegistry};

use thiserror::Error;

/// Errors from upstream HTTP calls.
///
/// Auxiliary-call errors never reach the client: the calling component
/// degrades to its identity behavior. Dispatch errors are converted to
/// `AppError::Dispatch` at the handler boundary.
#[derive(Debug, Error)]
pub enum UpstreamError {
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("upstream returned status {status}: {body}")]
    Status { status: u16, body: String },

    #[error("upstream response had no content")]
    EmptyResponse,

    #[error("upstream response was not valid JSON: {0}")]
    Decode(#[from] serde_json::Error),
}
