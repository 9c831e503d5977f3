//! Routing pipeline for Promptgate
//!
//! Classifies each turn for confidential content, selects the best backend
//! model, conditions the prompt, and fits the conversation to the chosen
//! model's budget. The orchestrator drives the pipeline; the leaf components
//! each wrap one auxiliary LLM call and degrade to identity behavior on any
//! failure.

pub mod alternatives;
pub mod classifier;
pub mod enhancer;
pub mod orchestrator;
pub mod parse;
pub mod selector;

pub use classifier::ConfidentialityClassifier;
pub use enhancer::PromptEnhancer;
pub use orchestrator::{RoutingOrchestrator, RoutingOutcome};
pub use selector::ModelSelector;

use serde::{Deserialize, Serialize};

/// Purpose of the user's query, as labeled by the selector
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Intent {
    CodeGeneration,
    CreativeWriting,
    QuestionAnswering,
    Analysis,
    Translation,
    Math,
    Confidential,
    #[default]
    Unknown,
}

impl Intent {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::CodeGeneration => "code_generation",
            Self::CreativeWriting => "creative_writing",
            Self::QuestionAnswering => "question_answering",
            Self::Analysis => "analysis",
            Self::Translation => "translation",
            Self::Math => "math",
            Self::Confidential => "confidential",
            Self::Unknown => "unknown",
        }
    }

    /// Parse a selector-produced label. Legacy short tags are accepted as
    /// synonyms of the canonical names.
    pub fn from_label(label: &str) -> Self {
        match label.trim().to_lowercase().as_str() {
            "code_generation" | "code" | "coding" => Self::CodeGeneration,
            "creative_writing" | "creative" => Self::CreativeWriting,
            "question_answering" | "qa" => Self::QuestionAnswering,
            "analysis" => Self::Analysis,
            "translation" => Self::Translation,
            "math" => Self::Math,
            "confidential" => Self::Confidential,
            _ => Self::Unknown,
        }
    }
}

/// How demanding the query is
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Complexity {
    Simple,
    #[default]
    Medium,
    Complex,
}

impl Complexity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Simple => "simple",
            Self::Medium => "medium",
            Self::Complex => "complex",
        }
    }

    pub fn from_label(label: &str) -> Self {
        match label.trim().to_lowercase().as_str() {
            "simple" => Self::Simple,
            "complex" => Self::Complex,
            _ => Self::Medium,
        }
    }
}

/// Result of model selection for one query
#[derive(Debug, Clone)]
pub struct RoutingDecision {
    pub recommended_model: String,
    pub intent: Intent,
    pub complexity: Complexity,
    pub reason: String,
    pub confidence: u8,
    pub should_switch: bool,
}

impl RoutingDecision {
    /// Identity decision: keep the user's current model.
    pub fn identity(current_model: &str, reason: impl Into<String>) -> Self {
        Self {
            recommended_model: current_model.to_string(),
            intent: Intent::Unknown,
            complexity: Complexity::Medium,
            reason: reason.into(),
            confidence: 50,
            should_switch: false,
        }
    }
}

/// Outcome of confidentiality classification
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfidentialityVerdict {
    pub is_confidential: bool,
    pub confidence: u8,
    pub categories: Vec<String>,
    pub reason: String,
}

impl ConfidentialityVerdict {
    /// The degraded verdict used when detection is unavailable; routing is
    /// never blocked on classification.
    pub fn safe_fallback() -> Self {
        Self {
            is_confidential: false,
            confidence: 0,
            categories: Vec::new(),
            reason: "Detection unavailable - treated as non-confidential".to_string(),
        }
    }
}

/// Outcome of prompt enhancement
#[derive(Debug, Clone)]
pub struct EnhancementVerdict {
    pub enhanced_prompt: String,
    pub changes: Vec<String>,
    pub should_enhance: bool,
    pub reason: String,
    pub similarity: f64,
}

impl EnhancementVerdict {
    /// Keep the original prompt untouched.
    pub fn unchanged(query: &str, reason: impl Into<String>, similarity: f64) -> Self {
        Self {
            enhanced_prompt: query.to_string(),
            changes: Vec::new(),
            should_enhance: false,
            reason: reason.into(),
            similarity,
        }
    }
}
