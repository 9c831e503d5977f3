//! Shared test support: scripted upstream mocks and app assembly.
#![allow(dead_code)]

use std::str::FromStr;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use axum::{
    Router,
    body::Body,
    http::{Request, StatusCode},
    middleware,
    routing::post,
};
use futures::StreamExt;
use serde_json::Value;
use tower::ServiceExt;

use promptgate::config::Config;
use promptgate::handlers::AppState;
use promptgate::metrics::Metrics;
use promptgate::middleware::request_id_middleware;
use promptgate::router::RoutingOrchestrator;
use promptgate::upstream::dispatch::{DispatchResponse, Dispatcher, EventStream};
use promptgate::upstream::llm::{AuxChatCall, JsonCompletionBackend};
use promptgate::upstream::registry::{ModelDescriptor, ModelRegistry};
use promptgate::upstream::UpstreamError;

pub const CONFIDENTIAL_MODEL: &str = "secure/on-prem-compound";

/// Test configuration; upstream URLs are never contacted because every
/// upstream is mocked.
pub fn test_config() -> Config {
    let toml = r#"
[server]
host = "127.0.0.1"
port = 3000

[routing]
aux_base_url = "http://localhost:9901/v1"
backend_base_url = "http://localhost:9902/v1"
registry_base_url = "http://localhost:9903"
selector_model = "llama-3.1-8b-instant"
enhancer_model = "llama-3.1-8b-instant"
classifier_model = "llama-3.1-8b-instant"
truncation_strategy = "sliding_window"
"#;
    Config::from_str(toml).expect("should parse test config")
}

// ---------------------------------------------------------------------------
// Scripted auxiliary LLM backend
// ---------------------------------------------------------------------------

/// Canned responses for the three auxiliary roles, plus a call log so tests
/// can assert which roles were consulted.
pub struct ScriptedAux {
    pub classifier: Result<String, ()>,
    pub selector: Result<String, ()>,
    pub enhancer: Result<String, ()>,
    pub summarizer: Result<String, ()>,
    calls: Mutex<Vec<String>>,
}

impl Default for ScriptedAux {
    fn default() -> Self {
        Self {
            classifier: Ok(non_confidential_json()),
            selector: Err(()),
            enhancer: Ok(r#"{"enhanced_prompt": "", "should_enhance": false}"#.to_string()),
            summarizer: Err(()),
            calls: Mutex::new(Vec::new()),
        }
    }
}

impl ScriptedAux {
    pub fn with_classifier(mut self, response: impl Into<String>) -> Self {
        self.classifier = Ok(response.into());
        self
    }

    pub fn with_selector(mut self, response: impl Into<String>) -> Self {
        self.selector = Ok(response.into());
        self
    }

    pub fn with_enhancer(mut self, response: impl Into<String>) -> Self {
        self.enhancer = Ok(response.into());
        self
    }

    /// Roles consulted so far, in call order.
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl JsonCompletionBackend for ScriptedAux {
    async fn complete(&self, call: AuxChatCall) -> Result<String, UpstreamError> {
        let kind = match call.system.as_deref() {
            None => "summarizer",
            Some(s) if s.contains("privacy") => "classifier",
            Some(s) if s.contains("model selection") => "selector",
            Some(s) if s.contains("prompt enhancer") => "enhancer",
            Some(_) => "unknown",
        };
        self.calls.lock().unwrap().push(kind.to_string());

        let response = match kind {
            "classifier" => &self.classifier,
            "selector" => &self.selector,
            "enhancer" => &self.enhancer,
            _ => &self.summarizer,
        };
        response.clone().map_err(|_| UpstreamError::EmptyResponse)
    }
}

pub fn non_confidential_json() -> String {
    r#"{"is_confidential": false, "confidence": 10, "categories": [], "reason": "safe"}"#
        .to_string()
}

pub fn confidential_json(confidence: u8) -> String {
    format!(
        r#"{{"is_confidential": true, "confidence": {}, "categories": ["pii"], "reason": "SSN value present"}}"#,
        confidence
    )
}

pub fn selector_json(recommended: &str, intent: &str, confidence: u8) -> String {
    format!(
        r#"{{"recommended_model": "{}", "intent": "{}", "complexity": "medium", "reason": "best fit", "confidence": {}}}"#,
        recommended, intent, confidence
    )
}

// ---------------------------------------------------------------------------
// Static registry
// ---------------------------------------------------------------------------

pub struct StaticRegistry(pub Result<Vec<ModelDescriptor>, ()>);

#[async_trait]
impl ModelRegistry for StaticRegistry {
    async fn list_active_models(
        &self,
        _bearer: Option<&str>,
    ) -> Result<Vec<ModelDescriptor>, UpstreamError> {
        self.0.clone().map_err(|_| UpstreamError::Status {
            status: 503,
            body: "registry unavailable".to_string(),
        })
    }
}

pub fn model(id: &str, context_window: usize) -> ModelDescriptor {
    ModelDescriptor {
        id: id.to_string(),
        name: id.to_string(),
        owned_by: "test".to_string(),
        context_window,
        capabilities: Vec::new(),
        is_active: true,
    }
}

/// The registry used by most tests.
pub fn default_registry() -> StaticRegistry {
    StaticRegistry(Ok(vec![
        model("llama-3.1-8b-instant", 8000),
        model("llama-3.3-70b-versatile", 128_000),
        model("mixtral-8x7b-32768", 32_768),
    ]))
}

// ---------------------------------------------------------------------------
// Recording dispatcher
// ---------------------------------------------------------------------------

/// Dispatcher that records every payload and answers with canned data.
pub struct RecordingDispatcher {
    pub status: u16,
    pub body: Value,
    pub stream_events: Vec<String>,
    dispatched: Mutex<Vec<Value>>,
}

impl Default for RecordingDispatcher {
    fn default() -> Self {
        Self {
            status: 200,
            body: serde_json::json!({
                "choices": [{"message": {"role": "assistant", "content": "backend reply"}}]
            }),
            stream_events: vec![
                r#"{"choices":[{"delta":{"content":"backend"}}]}"#.to_string(),
                "[DONE]".to_string(),
            ],
            dispatched: Mutex::new(Vec::new()),
        }
    }
}

impl RecordingDispatcher {
    /// Payloads forwarded to the backend so far.
    pub fn dispatched(&self) -> Vec<Value> {
        self.dispatched.lock().unwrap().clone()
    }
}

#[async_trait]
impl Dispatcher for RecordingDispatcher {
    async fn dispatch(
        &self,
        payload: &Value,
        _bearer: Option<&str>,
    ) -> Result<DispatchResponse, UpstreamError> {
        self.dispatched.lock().unwrap().push(payload.clone());
        Ok(DispatchResponse {
            status: self.status,
            body: self.body.clone(),
        })
    }

    async fn dispatch_stream(
        &self,
        payload: &Value,
        _bearer: Option<&str>,
    ) -> Result<EventStream, UpstreamError> {
        self.dispatched.lock().unwrap().push(payload.clone());
        let events = self.stream_events.clone();
        Ok(futures::stream::iter(events.into_iter().map(Ok)).boxed())
    }
}

// ---------------------------------------------------------------------------
// App assembly
// ---------------------------------------------------------------------------

pub fn make_state(
    aux: Arc<ScriptedAux>,
    registry: Arc<StaticRegistry>,
    dispatcher: Arc<RecordingDispatcher>,
) -> AppState {
    let config = Arc::new(test_config());
    let metrics = Arc::new(Metrics::new().expect("metrics should initialize"));
    let orchestrator = Arc::new(RoutingOrchestrator::new(
        aux,
        registry,
        &config.routing,
        &config.timeouts,
        CONFIDENTIAL_MODEL.to_string(),
        metrics.clone(),
    ));
    AppState::from_parts(config, orchestrator, dispatcher, metrics)
}

pub fn make_app(state: AppState) -> Router {
    Router::new()
        .route("/chat/completions", post(promptgate::handlers::chat::handler))
        .with_state(state)
        .layer(middleware::from_fn(request_id_middleware))
}

/// POST a JSON body to /chat/completions and return status + raw body bytes.
pub async fn post_chat(app: Router, body: Value) -> (StatusCode, Vec<u8>) {
    let request = Request::builder()
        .method("POST")
        .uri("/chat/completions")
        .header("content-type", "application/json")
        .header("authorization", "Bearer inbound-user-token")
        .body(Body::from(body.to_string()))
        .unwrap();

    let response = app.oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap()
        .to_vec();
    (status, bytes)
}

/// POST and parse the response as JSON.
pub async fn post_chat_json(app: Router, body: Value) -> (StatusCode, Value) {
    let (status, bytes) = post_chat(app, body).await;
    let value = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, value)
}
