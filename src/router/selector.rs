//! Model selection
//!
//! Asks a cheap auxiliary model to recommend the best backend for the query.
//! Two hard rules are enforced here rather than trusted to the LLM: the
//! recommendation must come from the live registry, and any failure degrades
//! to identity routing (keep the user's model, no switch).

use std::sync::Arc;
use std::time::Duration;

use crate::metrics::Metrics;
use crate::router::parse::{get_confidence, get_str, safe_json_parse};
use crate::router::{Complexity, Intent, RoutingDecision};
use crate::upstream::llm::{AuxChatCall, JsonCompletionBackend};
use crate::upstream::registry::ModelDescriptor;

/// Selector wrapper around one auxiliary LLM call
pub struct ModelSelector {
    backend: Arc<dyn JsonCompletionBackend>,
    model: String,
    timeout: Duration,
    metrics: Arc<Metrics>,
}

impl ModelSelector {
    pub fn new(
        backend: Arc<dyn JsonCompletionBackend>,
        model: impl Into<String>,
        timeout: Duration,
        metrics: Arc<Metrics>,
    ) -> Self {
        Self {
            backend,
            model: model.into(),
            timeout,
            metrics,
        }
    }

    /// Recommend a model for the query. Total: every failure path returns
    /// the identity decision.
    pub async fn select(
        &self,
        query: &str,
        current_model: &str,
        available: &[ModelDescriptor],
    ) -> RoutingDecision {
        if available.is_empty() {
            tracing::warn!("no models available for selection");
            return RoutingDecision::identity(current_model, "No alternatives available");
        }

        let call = AuxChatCall {
            model: self.model.clone(),
            system: Some(build_selector_prompt(available)),
            user: format!("Query: {}\nCurrent model: {}", query, current_model),
            temperature: 0.0,
            max_tokens: 300,
            timeout: self.timeout,
            json_mode: true,
        };

        let raw = match self.backend.complete(call).await {
            Ok(raw) => raw,
            Err(e) => {
                tracing::warn!(error = %e, "model selection failed, keeping current model");
                self.metrics.record_aux_degradation("selector");
                return RoutingDecision::identity(current_model, format!("Error: {}", e));
            }
        };

        let parsed = safe_json_parse(&raw);
        let mut recommended = get_str(&parsed, "recommended_model", current_model);

        // Hard rule: the recommendation must exist in the registry.
        if !available.iter().any(|m| m.id == recommended) {
            tracing::warn!(
                recommended = %recommended,
                "selector recommended a model outside the registry, keeping current"
            );
            recommended = current_model.to_string();
        }

        let should_switch = recommended != current_model;
        let decision = RoutingDecision {
            intent: Intent::from_label(&get_str(&parsed, "intent", "unknown")),
            complexity: Complexity::from_label(&get_str(&parsed, "complexity", "medium")),
            reason: get_str(&parsed, "reason", "Auto-selected"),
            confidence: get_confidence(&parsed, "confidence", 70),
            recommended_model: recommended,
            should_switch,
        };

        tracing::info!(
            recommended = %decision.recommended_model,
            intent = decision.intent.as_str(),
            confidence = decision.confidence,
            should_switch = decision.should_switch,
            "model selection complete"
        );

        decision
    }
}

/// System prompt listing the live registry and the selection policy.
fn build_selector_prompt(available: &[ModelDescriptor]) -> String {
    let model_list = available
        .iter()
        .map(|m| format!("  - {}: {} (context: {})", m.id, m.name, m.context_window))
        .collect::<Vec<_>>()
        .join("\n");

    format!(
        r#"You are an intelligent model selection engine.

AVAILABLE MODELS:
{}

YOUR TASK:
Analyze the user's query and recommend the BEST model from the available list above.

SELECTION CRITERIA:
1. **Code generation/debugging**: Prefer models with larger context windows and strong reasoning
2. **Creative writing**: Prefer models with good language understanding
3. **Simple questions**: Use faster, smaller models
4. **Complex reasoning/analysis**: Use larger, more capable models
5. **Translation/multilingual**: Prefer models trained on multiple languages
6. **Math/logic**: Prefer models with strong reasoning capabilities

IMPORTANT RULES:
- Only recommend models from the AVAILABLE MODELS list above
- Consider context window requirements for long conversations
- Balance performance vs speed based on complexity
- If user selected model is already optimal, keep it

Return ONLY valid JSON in this exact format:
{{
  "recommended_model": "exact-model-id-from-list",
  "intent": "code_generation|creative_writing|question_answering|analysis|translation|math",
  "complexity": "simple|medium|complex",
  "reason": "brief explanation why this model is best",
  "confidence": 0-100
}}"#,
        model_list
    )
}
