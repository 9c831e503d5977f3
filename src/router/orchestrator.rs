//! Routing orchestration
//!
//! Drives the full pipeline for one chat turn. The control flow is a
//! transition table over metadata flags, evaluated top-down:
//!
//! | condition                      | action                                   |
//! |--------------------------------|------------------------------------------|
//! | media generation / background  | pass through untouched                   |
//! | already processed              | pass through untouched                   |
//! | recommendation decision set    | classify + enhance only, keep model      |
//! | toggle on, first turn          | classify ‖ registry, select; on switch return a recommendation instead of dispatching |
//! | toggle off, first turn         | classify ‖ registry, select; switch silently and forward |
//!
//! Confidential queries always override the selection: they go to the
//! statically configured confidential model, no matter what the selector
//! said. Classification and the registry fetch run concurrently so the
//! added latency is the maximum of the two, not the sum.

use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::config::{RoutingConfig, TimeoutConfig};
use crate::conversation::{ConversationManager, TruncationStrategy};
use crate::handlers::types::{
    ChatMessage, ChatRequest, OBJECT_MODEL_RECOMMENDATION, RecommendationEnvelope,
};
use crate::metrics::Metrics;
use crate::router::alternatives::top_alternatives;
use crate::router::{
    Complexity, ConfidentialityClassifier, ConfidentialityVerdict, Intent, ModelSelector,
    PromptEnhancer, RoutingDecision,
};
use crate::tokens;
use crate::upstream::llm::{AuxChatCall, JsonCompletionBackend};
use crate::upstream::registry::{ModelDescriptor, ModelRegistry};

/// What the handler should do with the request
#[derive(Debug)]
pub enum RoutingOutcome {
    /// Dispatch this (possibly conditioned) request to the backend.
    Forward(ChatRequest),
    /// Return the recommendation to the client; no dispatch happens.
    Recommend(Box<RecommendationEnvelope>),
}

/// Per-process orchestrator; all state is read-only configuration and
/// pooled clients, so one instance serves every request.
pub struct RoutingOrchestrator {
    classifier: ConfidentialityClassifier,
    selector: ModelSelector,
    enhancer: PromptEnhancer,
    registry: Arc<dyn ModelRegistry>,
    backend: Arc<dyn JsonCompletionBackend>,
    confidential_model: String,
    summarizer_model: String,
    summarizer_timeout: Duration,
    truncation_strategy: TruncationStrategy,
    enable_summarization: bool,
    metrics: Arc<Metrics>,
}

impl RoutingOrchestrator {
    pub fn new(
        backend: Arc<dyn JsonCompletionBackend>,
        registry: Arc<dyn ModelRegistry>,
        routing: &RoutingConfig,
        timeouts: &TimeoutConfig,
        confidential_model: String,
        metrics: Arc<Metrics>,
    ) -> Self {
        let classifier = ConfidentialityClassifier::new(
            backend.clone(),
            routing.classifier_model.clone(),
            Duration::from_secs(timeouts.classifier_seconds),
            metrics.clone(),
        );
        let selector = ModelSelector::new(
            backend.clone(),
            routing.selector_model.clone(),
            Duration::from_secs(timeouts.selector_seconds),
            metrics.clone(),
        );
        let enhancer = PromptEnhancer::new(
            backend.clone(),
            routing.enhancer_model.clone(),
            Duration::from_secs(timeouts.enhancer_seconds),
            metrics.clone(),
        );

        Self {
            classifier,
            selector,
            enhancer,
            registry,
            backend,
            confidential_model,
            summarizer_model: routing.selector_model.clone(),
            summarizer_timeout: Duration::from_secs(timeouts.selector_seconds),
            truncation_strategy: routing.truncation_strategy,
            enable_summarization: routing.enable_summarization,
            metrics,
        }
    }

    /// Route one chat turn. Total: auxiliary failures degrade inside their
    /// components, so this never errors.
    pub async fn route(&self, mut request: ChatRequest, bearer: Option<&str>) -> RoutingOutcome {
        // Some clients send `auto_select`; it has no routing meaning and
        // must not reach the backend on any path.
        request.params.remove("auto_select");

        if request.metadata.bypasses_routing() {
            tracing::debug!(model = %request.model, "bypass flag set, passing through");
            self.metrics.record_request("bypass");
            return RoutingOutcome::Forward(request);
        }

        if request.metadata.slm_processed {
            tracing::debug!("request already processed, passing through");
            self.metrics.record_request("passthrough");
            return RoutingOutcome::Forward(request);
        }

        let Some(query) = request.latest_user_text().map(str::to_string) else {
            tracing::warn!("no user message found, passing through");
            self.metrics.record_request("passthrough");
            return RoutingOutcome::Forward(request);
        };

        let started = Instant::now();

        let enhancement_only = request.metadata.slm_decision.is_some();
        let show_recommendation = request.metadata.slm_enabled;

        let (verdict, decision, available) = if enhancement_only {
            // The client already accepted or rejected a recommendation;
            // classification runs for bookkeeping only.
            let verdict = self.classifier.classify(&query).await;
            let decision = RoutingDecision {
                recommended_model: request.model.clone(),
                intent: if verdict.is_confidential {
                    Intent::Confidential
                } else {
                    Intent::Unknown
                },
                complexity: Complexity::Medium,
                reason: "Enhancement-only mode".to_string(),
                confidence: 100,
                should_switch: false,
            };
            (verdict, decision, Vec::new())
        } else {
            let (verdict, registry_result) = tokio::join!(
                self.classifier.classify(&query),
                self.registry.list_active_models(bearer)
            );

            let available: Vec<ModelDescriptor> = match registry_result {
                Ok(models) => models,
                Err(e) => {
                    tracing::warn!(error = %e, "registry fetch failed, no routing alternatives");
                    self.metrics.record_aux_degradation("registry");
                    Vec::new()
                }
            };

            if available.is_empty() {
                tracing::warn!("no routable models, passing through");
                self.metrics.record_request("passthrough");
                return RoutingOutcome::Forward(request);
            }

            let decision = if verdict.is_confidential {
                // Confidential override: non-negotiable, the selector is
                // not consulted.
                tracing::info!(model = %self.confidential_model, "confidential override applied");
                RoutingDecision {
                    recommended_model: self.confidential_model.clone(),
                    intent: Intent::Confidential,
                    complexity: Complexity::Medium,
                    reason: verdict.reason.clone(),
                    confidence: verdict.confidence,
                    should_switch: self.confidential_model != request.model,
                }
            } else {
                self.selector.select(&query, &request.model, &available).await
            };

            (verdict, decision, available)
        };

        // Toggle on: consult the user instead of silently dispatching.
        if show_recommendation && decision.should_switch && !enhancement_only {
            tracing::info!(
                recommended = %decision.recommended_model,
                "returning model recommendation"
            );
            self.metrics.record_request("recommend");
            self.metrics
                .record_routing_duration(started.elapsed().as_secs_f64() * 1000.0);

            let envelope = self.build_envelope(&request, &decision, &verdict, &available);
            return RoutingOutcome::Recommend(Box::new(envelope));
        }

        // Toggle off: switch silently.
        if decision.should_switch && !enhancement_only {
            tracing::info!(
                from = %request.model,
                to = %decision.recommended_model,
                "auto-switching model"
            );
            request.model = decision.recommended_model.clone();
        }

        let final_model = request.model.clone();

        let enhancement = self
            .enhancer
            .enhance(&query, decision.intent, decision.complexity)
            .await;
        if enhancement.should_enhance {
            request.rewrite_latest_user_text(&enhancement.enhanced_prompt);
        }

        // Budget enforcement runs against the final model, after the
        // rewrite, so the forwarded list is the one that was truncated.
        let original_tokens = tokens::estimate_messages(&request.messages);
        let manager = ConversationManager::for_model(&final_model);
        let truncated = manager.truncate(&request.messages, self.truncation_strategy);
        let truncated_tokens = tokens::estimate_messages(&truncated);
        let removed = request.messages.len().saturating_sub(truncated.len());

        if removed > 0 {
            tracing::info!(
                removed,
                original_tokens,
                truncated_tokens,
                model = %final_model,
                "conversation history truncated"
            );
        }

        let mut messages = truncated;
        if self.enable_summarization && removed > 3 {
            let summary = self.summarize(&request.messages[..removed]).await;
            messages = manager.add_context_summary(&messages, &summary);
        }
        request.messages = messages;

        let budget_exceeded = truncated_tokens > manager.max_history_tokens();
        if budget_exceeded {
            tracing::warn!(
                truncated_tokens,
                budget = manager.max_history_tokens(),
                "message list exceeds budget even after truncation, forwarding as-is"
            );
        }

        let meta = &mut request.metadata;
        meta.slm_processed = true;
        meta.slm_intent = Some(decision.intent.as_str().to_string());
        meta.slm_complexity = Some(decision.complexity.as_str().to_string());
        meta.slm_enhanced = Some(enhancement.should_enhance);
        meta.slm_similarity = Some(enhancement.similarity);
        meta.slm_original_tokens = Some(original_tokens);
        meta.slm_truncated_tokens = Some(truncated_tokens);
        meta.slm_messages_removed = Some(removed);
        meta.slm_budget_exceeded = budget_exceeded.then_some(true);

        self.metrics.record_request("forward");
        self.metrics
            .record_routing_duration(started.elapsed().as_secs_f64() * 1000.0);

        RoutingOutcome::Forward(request)
    }

    fn build_envelope(
        &self,
        request: &ChatRequest,
        decision: &RoutingDecision,
        verdict: &ConfidentialityVerdict,
        available: &[ModelDescriptor],
    ) -> RecommendationEnvelope {
        RecommendationEnvelope {
            kind: OBJECT_MODEL_RECOMMENDATION.to_string(),
            current_model: request.model.clone(),
            recommended_model: decision.recommended_model.clone(),
            reason: decision.reason.clone(),
            intent: decision.intent.as_str().to_string(),
            complexity: decision.complexity.as_str().to_string(),
            confidence: decision.confidence,
            alternatives: top_alternatives(decision.intent, &decision.recommended_model, available),
            is_confidential: verdict.is_confidential,
            confidential_info: verdict.clone(),
            message: format!(
                "{} is recommended for this query ({}, {}).",
                decision.recommended_model,
                decision.intent.as_str(),
                decision.complexity.as_str()
            ),
        }
    }

    /// Summarize messages that truncation removed. Degrades to a fixed
    /// placeholder so the forwarded request never blocks on this call.
    async fn summarize(&self, removed: &[ChatMessage]) -> String {
        let context_text = removed
            .iter()
            .map(|m| format!("{}: {}", m.role().as_str(), m.content()))
            .collect::<Vec<_>>()
            .join("\n");

        let call = AuxChatCall {
            model: self.summarizer_model.clone(),
            system: None,
            user: format!(
                "Summarize this conversation history in 200 tokens or less.\n\
                 Focus on key topics, decisions, and context needed for future messages.\n\
                 Be concise and factual.\n\nConversation:\n{}\n\nSummary:",
                context_text
            ),
            temperature: 0.3,
            max_tokens: 200,
            timeout: self.summarizer_timeout,
            json_mode: false,
        };

        match self.backend.complete(call).await {
            Ok(summary) => {
                tracing::info!(
                    messages = removed.len(),
                    chars = summary.len(),
                    "truncated context summarized"
                );
                summary.trim().to_string()
            }
            Err(e) => {
                tracing::warn!(error = %e, "context summarization failed");
                self.metrics.record_aux_degradation("summarizer");
                "Previous conversation context (details truncated due to length)".to_string()
            }
        }
    }
}
