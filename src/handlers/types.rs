//! Inbound and outbound chat types
//!
//! These follow the OpenAI Chat Completions wire shape. Unknown request
//! parameters are captured and forwarded untouched so the router stays
//! transparent to backend-specific options. Validation happens during
//! deserialization - invalid instances cannot exist.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

/// Maximum number of messages accepted per request
const MAX_MESSAGES: usize = 500;

/// Object type tag for recommendation responses
pub const OBJECT_MODEL_RECOMMENDATION: &str = "model_recommendation";

// =============================================================================
// Messages
// =============================================================================

/// Message role in the conversation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    System,
    User,
    Assistant,
}

impl MessageRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::System => "system",
            Self::User => "user",
            Self::Assistant => "assistant",
        }
    }
}

/// A single message in the conversation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    role: MessageRole,
    content: String,
}

impl ChatMessage {
    pub fn new(role: MessageRole, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }

    pub fn role(&self) -> MessageRole {
        self.role
    }

    pub fn content(&self) -> &str {
        &self.content
    }

    /// Replace the content, keeping the role. Used when an accepted
    /// enhancement is written back onto the last user message.
    pub fn set_content(&mut self, content: impl Into<String>) {
        self.content = content.into();
    }

    pub fn is_system(&self) -> bool {
        self.role == MessageRole::System
    }

    pub fn is_user(&self) -> bool {
        self.role == MessageRole::User
    }
}

// =============================================================================
// Routing metadata
// =============================================================================

/// Client decision on a previously returned model recommendation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SlmDecision {
    Accept,
    Reject,
}

/// Metadata map carried on every chat request.
///
/// Inbound fields control routing; `slm_*` observability fields are written
/// by the orchestrator before dispatch. Unknown keys round-trip through
/// `extra` so upstream plumbing (event emitters, background task markers)
/// keeps working.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RequestMetadata {
    #[serde(default)]
    pub slm_enabled: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub slm_decision: Option<SlmDecision>,
    #[serde(default)]
    pub slm_processed: bool,
    #[serde(default)]
    pub image_generation: bool,
    #[serde(default)]
    pub video_generation: bool,
    /// Present for background tasks (title generation, tagging); any
    /// non-empty value bypasses routing entirely.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub task: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,

    // Observability fields, populated on the outbound request.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub slm_intent: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub slm_complexity: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub slm_enhanced: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub slm_similarity: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub slm_original_tokens: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub slm_truncated_tokens: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub slm_messages_removed: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub slm_budget_exceeded: Option<bool>,

    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl RequestMetadata {
    /// True when the request must skip classification, selection, and
    /// enhancement entirely (media generation or a background task).
    pub fn bypasses_routing(&self) -> bool {
        self.image_generation
            || self.video_generation
            || self.task.as_deref().is_some_and(|t| !t.is_empty())
    }
}

// =============================================================================
// Chat request
// =============================================================================

/// OpenAI-style chat completion request with routing metadata.
///
/// All parameters the router does not interpret (temperature, top_p, tool
/// definitions, ...) land in `params` and are forwarded verbatim.
#[derive(Debug, Clone, Serialize)]
pub struct ChatRequest {
    pub model: String,
    pub messages: Vec<ChatMessage>,
    pub stream: bool,
    pub metadata: RequestMetadata,
    #[serde(flatten)]
    pub params: Map<String, Value>,
}

impl ChatRequest {
    /// Content of the last user-role message, if any.
    pub fn latest_user_text(&self) -> Option<&str> {
        self.messages
            .iter()
            .rev()
            .find(|m| m.is_user())
            .map(|m| m.content())
    }

    /// Replace the content of the last user-role message.
    ///
    /// No-op when the conversation has no user message.
    pub fn rewrite_latest_user_text(&mut self, content: &str) {
        if let Some(msg) = self.messages.iter_mut().rev().find(|m| m.is_user()) {
            msg.set_content(content);
        }
    }
}

impl<'de> Deserialize<'de> for ChatRequest {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        #[derive(Deserialize)]
        struct RawRequest {
            model: String,
            messages: Vec<ChatMessage>,
            #[serde(default)]
            stream: bool,
            #[serde(default)]
            metadata: RequestMetadata,
            #[serde(flatten)]
            params: Map<String, Value>,
        }

        let raw = RawRequest::deserialize(deserializer)?;

        if raw.model.trim().is_empty() {
            return Err(serde::de::Error::custom("model cannot be empty"));
        }
        if raw.messages.is_empty() {
            return Err(serde::de::Error::custom("messages array cannot be empty"));
        }
        if raw.messages.len() > MAX_MESSAGES {
            return Err(serde::de::Error::custom(format!(
                "messages array cannot exceed {} messages (got {})",
                MAX_MESSAGES,
                raw.messages.len()
            )));
        }

        Ok(ChatRequest {
            model: raw.model,
            messages: raw.messages,
            stream: raw.stream,
            metadata: raw.metadata,
            params: raw.params,
        })
    }
}

// =============================================================================
// Recommendation envelope
// =============================================================================

/// A runner-up model offered alongside the primary recommendation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AlternativeModel {
    pub id: String,
    pub name: String,
    pub recommended_for: String,
}

/// Response returned instead of dispatching when the router proposes a
/// different model and the client asked to be consulted first.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecommendationEnvelope {
    #[serde(rename = "type")]
    pub kind: String,
    pub current_model: String,
    pub recommended_model: String,
    pub reason: String,
    pub intent: String,
    pub complexity: String,
    pub confidence: u8,
    pub alternatives: Vec<AlternativeModel>,
    pub is_confidential: bool,
    pub confidential_info: crate::router::ConfidentialityVerdict,
    pub message: String,
}
