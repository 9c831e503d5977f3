//! Client for the auxiliary LLM endpoint
//!
//! The classifier, selector, and enhancer all go through one
//! OpenAI-compatible endpoint with an enforced JSON response format.
//! Authentication uses the process-wide API key loaded at startup.

use std::time::Duration;

use async_trait::async_trait;
use serde_json::{Value, json};

use super::UpstreamError;

/// One auxiliary chat completion call.
#[derive(Debug, Clone)]
pub struct AuxChatCall {
    pub model: String,
    pub system: Option<String>,
    pub user: String,
    pub temperature: f64,
    pub max_tokens: u32,
    pub timeout: Duration,
    /// Request `response_format={"type":"json_object"}`. The summarizer is
    /// the only caller that turns this off.
    pub json_mode: bool,
}

/// Seam for the auxiliary LLM endpoint.
///
/// Production uses [`AuxLlmClient`]; tests substitute canned responses.
#[async_trait]
pub trait JsonCompletionBackend: Send + Sync {
    /// Run one completion and return the raw assistant text.
    async fn complete(&self, call: AuxChatCall) -> Result<String, UpstreamError>;
}

/// Pooled HTTP client for the auxiliary endpoint
#[derive(Debug, Clone)]
pub struct AuxLlmClient {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl AuxLlmClient {
    pub fn new(base_url: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into(),
            api_key: api_key.into(),
        }
    }
}

#[async_trait]
impl JsonCompletionBackend for AuxLlmClient {
    async fn complete(&self, call: AuxChatCall) -> Result<String, UpstreamError> {
        let mut messages = Vec::with_capacity(2);
        if let Some(system) = &call.system {
            messages.push(json!({"role": "system", "content": system}));
        }
        messages.push(json!({"role": "user", "content": call.user}));

        let mut body = json!({
            "model": call.model,
            "messages": messages,
            "temperature": call.temperature,
            "max_tokens": call.max_tokens,
        });
        if call.json_mode {
            body["response_format"] = json!({"type": "json_object"});
        }

        let url = format!("{}/chat/completions", self.base_url.trim_end_matches('/'));

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .timeout(call.timeout)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(UpstreamError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let payload: Value = response.json().await?;
        let content = payload
            .pointer("/choices/0/message/content")
            .and_then(Value::as_str)
            .unwrap_or_default();

        if content.trim().is_empty() {
            return Err(UpstreamError::EmptyResponse);
        }

        Ok(content.to_string())
    }
}
