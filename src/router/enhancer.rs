//! Prompt enhancement with anti-drift guards
//!
//! Rewrites the user's query for clarity without changing its intent. The
//! model's output is never trusted directly: cheap heuristics skip the call
//! entirely for queries that cannot benefit, and post-call guards reject
//! any rewrite that drifts, balloons, or shrinks. Rejection always returns
//! the original prompt.

use std::collections::HashSet;
use std::sync::Arc;
use std::sync::OnceLock;
use std::time::Duration;

use regex::Regex;

use crate::metrics::Metrics;
use crate::router::parse::{get_bool, get_str, get_str_list, safe_json_parse};
use crate::router::{Complexity, EnhancementVerdict, Intent};
use crate::upstream::llm::{AuxChatCall, JsonCompletionBackend};

/// Queries shorter than this gain nothing from enhancement.
const MIN_QUERY_LENGTH: usize = 10;

/// Queries longer than this are already detailed.
const MAX_QUERY_LENGTH: usize = 500;

/// Reject rewrites longer than this multiple of the original.
const MAX_ENHANCEMENT_RATIO: f64 = 3.0;

/// Reject rewrites that share less keyword overlap than this.
const MIN_SIMILARITY: f64 = 0.3;

const GREETINGS: &[&str] = &[
    "hi",
    "hello",
    "hey",
    "greetings",
    "good morning",
    "good afternoon",
    "good evening",
    "whats up",
    "what's up",
    "sup",
];

const ACKNOWLEDGMENT_PREFIXES: &[&str] =
    &["yes", "no", "ok", "okay", "sure", "thanks", "thank you"];

const STOPWORDS: &[&str] = &[
    "the", "a", "an", "and", "or", "but", "in", "on", "at", "to", "for", "of", "with", "is",
    "are", "was", "were", "be", "been", "being",
];

fn word_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\w+").expect("word regex is valid"))
}

/// Jaccard similarity over lowercase word sets, stopwords removed.
pub fn keyword_similarity(text1: &str, text2: &str) -> f64 {
    let stopwords: HashSet<&str> = STOPWORDS.iter().copied().collect();

    let words = |text: &str| -> HashSet<String> {
        word_re()
            .find_iter(&text.to_lowercase())
            .map(|m| m.as_str().to_string())
            .filter(|w| !stopwords.contains(w.as_str()))
            .collect()
    };

    let set1 = words(text1);
    let set2 = words(text2);

    if set1.is_empty() || set2.is_empty() {
        return 0.0;
    }

    let intersection = set1.intersection(&set2).count();
    let union = set1.union(&set2).count();

    intersection as f64 / union as f64
}

/// Decide whether a query should skip enhancement entirely.
///
/// Returns the skip reason, or `None` when the query is worth enhancing.
pub fn should_skip(query: &str) -> Option<&'static str> {
    let lowered = query.to_lowercase().trim().to_string();
    let query_chars = query.chars().count();

    if query_chars < MIN_QUERY_LENGTH {
        return Some("Query too short");
    }
    if GREETINGS.contains(&lowered.as_str()) || lowered.split_whitespace().count() <= 2 {
        return Some("Greeting or very short message");
    }
    if ACKNOWLEDGMENT_PREFIXES
        .iter()
        .any(|p| lowered.starts_with(p))
    {
        return Some("Acknowledgment or simple response");
    }
    if query_chars > MAX_QUERY_LENGTH {
        return Some("Query already detailed");
    }

    None
}

/// Enhancer wrapper around one auxiliary LLM call
pub struct PromptEnhancer {
    backend: Arc<dyn JsonCompletionBackend>,
    model: String,
    timeout: Duration,
    metrics: Arc<Metrics>,
}

impl PromptEnhancer {
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

    /// Enhance a query. Total: every rejection and failure path returns the
    /// original prompt.
    pub async fn enhance(
        &self,
        query: &str,
        intent: Intent,
        complexity: Complexity,
    ) -> EnhancementVerdict {
        if let Some(reason) = should_skip(query) {
            tracing::debug!(reason, "enhancement skipped");
            self.metrics.record_enhancement("skipped");
            return EnhancementVerdict::unchanged(query, reason, 1.0);
        }

        let call = AuxChatCall {
            model: self.model.clone(),
            system: Some(build_enhancer_prompt()),
            user: format!(
                "Original query: {}\nIntent: {}\nComplexity: {}",
                query,
                intent.as_str(),
                complexity.as_str()
            ),
            temperature: 0.2,
            max_tokens: 400,
            timeout: self.timeout,
            json_mode: true,
        };

        let raw = match self.backend.complete(call).await {
            Ok(raw) => raw,
            Err(e) => {
                tracing::warn!(error = %e, "enhancement failed, keeping original prompt");
                self.metrics.record_aux_degradation("enhancer");
                return EnhancementVerdict::unchanged(query, format!("Error: {}", e), 0.0);
            }
        };

        let parsed = safe_json_parse(&raw);
        let enhanced = get_str(&parsed, "enhanced_prompt", query);
        let should_enhance = get_bool(&parsed, "should_enhance", true);
        let changes = get_str_list(&parsed, "changes");

        // Guards below are authoritative regardless of what the model said.

        if !should_enhance {
            self.metrics.record_enhancement("rejected");
            return EnhancementVerdict::unchanged(
                query,
                "Model determined enhancement unnecessary",
                1.0,
            );
        }

        // Lengths are char counts, not bytes, matching the estimator's
        // convention in `tokens`.
        let query_chars = query.chars().count();
        let enhanced_chars = enhanced.chars().count();

        let ratio = enhanced_chars as f64 / query_chars.max(1) as f64;
        if ratio > MAX_ENHANCEMENT_RATIO {
            tracing::warn!(ratio, "enhancement too long, rejecting");
            self.metrics.record_enhancement("rejected");
            return EnhancementVerdict::unchanged(
                query,
                format!("Enhancement exceeded length limit ({:.1}x)", ratio),
                0.0,
            );
        }

        let similarity = keyword_similarity(query, &enhanced);
        if similarity < MIN_SIMILARITY {
            tracing::warn!(similarity, "enhancement drifted off topic, rejecting");
            self.metrics.record_enhancement("rejected");
            return EnhancementVerdict::unchanged(
                query,
                format!("Enhancement changed topic (similarity: {:.2})", similarity),
                similarity,
            );
        }

        if enhanced.trim().is_empty() || (enhanced_chars as f64) < query_chars as f64 * 0.8 {
            tracing::warn!("enhancement weaker than original, rejecting");
            self.metrics.record_enhancement("rejected");
            return EnhancementVerdict::unchanged(query, "Enhanced version weaker than original", 0.0);
        }

        tracing::info!(similarity, "enhancement validated");
        self.metrics.record_enhancement("applied");

        EnhancementVerdict {
            enhanced_prompt: enhanced,
            changes,
            should_enhance: true,
            reason: "Successfully enhanced".to_string(),
            similarity,
        }
    }
}

/// System prompt with the anti-drift contract.
fn build_enhancer_prompt() -> String {
    r#"You are a prompt enhancer. Improve clarity WITHOUT changing intent.

STRICT RULES:
1. Keep the EXACT same request/question
2. Add specificity and structure ONLY
3. DO NOT add new requirements or topics
4. DO NOT make assumptions about context
5. Keep length under 2x original
6. If query is already clear, return it unchanged

CRITICAL: Respond ONLY with valid JSON. No explanation, no markdown, just JSON.

{
  "enhanced_prompt": "improved version",
  "changes": ["change1", "change2"],
  "should_enhance": true/false
}

If query is a greeting, simple question, or already clear, set should_enhance=false."#
        .to_string()
}
