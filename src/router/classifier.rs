//! Confidentiality classification
//!
//! Decides whether the user's latest query carries actual sensitive values
//! (not merely sensitive topics). Detection must never block routing: any
//! failure degrades to a safe non-confidential verdict.

use std::sync::Arc;
use std::time::Duration;

use crate::metrics::Metrics;
use crate::router::parse::{get_bool, get_confidence, get_str, get_str_list, safe_json_parse};
use crate::router::ConfidentialityVerdict;
use crate::upstream::llm::{AuxChatCall, JsonCompletionBackend};

/// Queries shorter than this (trimmed) are never classified.
const MIN_QUERY_LENGTH: usize = 5;

/// Classifier wrapper around one auxiliary LLM call
pub struct ConfidentialityClassifier {
    backend: Arc<dyn JsonCompletionBackend>,
    model: String,
    timeout: Duration,
    metrics: Arc<Metrics>,
}

impl ConfidentialityClassifier {
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

    /// Classify a query. Total: every failure path returns the safe
    /// fallback verdict.
    pub async fn classify(&self, query: &str) -> ConfidentialityVerdict {
        if query.trim().len() < MIN_QUERY_LENGTH {
            return ConfidentialityVerdict::safe_fallback();
        }

        let call = AuxChatCall {
            model: self.model.clone(),
            system: Some(build_classifier_prompt()),
            user: format!("Classify this query:\n{}", query),
            temperature: 0.0,
            max_tokens: 200,
            timeout: self.timeout,
            json_mode: true,
        };

        let raw = match self.backend.complete(call).await {
            Ok(raw) => raw,
            Err(e) => {
                tracing::warn!(error = %e, "confidentiality detection failed, treating as non-confidential");
                self.metrics.record_aux_degradation("classifier");
                return ConfidentialityVerdict::safe_fallback();
            }
        };

        let parsed = safe_json_parse(&raw);
        let verdict = ConfidentialityVerdict {
            is_confidential: get_bool(&parsed, "is_confidential", false),
            confidence: get_confidence(&parsed, "confidence", 0),
            categories: get_str_list(&parsed, "categories"),
            reason: get_str(&parsed, "reason", "No details provided"),
        };

        if verdict.is_confidential {
            tracing::warn!(
                confidence = verdict.confidence,
                categories = ?verdict.categories,
                "confidential data detected in query"
            );
        } else {
            tracing::debug!(
                confidence = verdict.confidence,
                "no confidential data detected"
            );
        }

        verdict
    }
}

/// System prompt for the privacy classifier.
fn build_classifier_prompt() -> String {
    r#"You are a privacy and data-security classifier.

Your only job is to detect whether the user query contains confidential or sensitive information.

Categories to check:
- PII: full names combined with ID numbers, social security numbers, passport numbers, national IDs, date-of-birth + name combos, home addresses
- CREDENTIALS: passwords, API keys, tokens, secret keys, private keys
- FINANCIAL: bank account numbers, credit/debit card numbers, CVVs, PINs, transaction details
- MEDICAL: health diagnoses, prescriptions, patient records, insurance details
- INTERNAL BUSINESS: unreleased product details, internal project codes, employee salary data, M&A information

IMPORTANT RULES:
- A query that ASKS ABOUT these topics (e.g. "what is an SSN?") is NOT confidential.
- A query that CONTAINS actual confidential values (e.g. "my SSN is 123-45-6789") IS confidential.
- General business questions, coding questions, and general knowledge are NOT confidential.
- Be conservative - only flag when you are highly confident actual sensitive data is present.

Respond ONLY with valid JSON, no explanation:
{
  "is_confidential": true/false,
  "confidence": 0-100,
  "categories": ["pii", "credentials", "financial", "medical", "internal_business"],
  "reason": "one-sentence human-readable explanation of what sensitive data was found, or why it is safe"
}"#
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::upstream::UpstreamError;
    use async_trait::async_trait;

    struct CannedBackend(Result<String, ()>);

    #[async_trait]
    impl JsonCompletionBackend for CannedBackend {
        async fn complete(&self, _call: AuxChatCall) -> Result<String, UpstreamError> {
            self.0
                .clone()
                .map_err(|_| UpstreamError::EmptyResponse)
        }
    }

    fn classifier(response: Result<String, ()>) -> ConfidentialityClassifier {
        ConfidentialityClassifier::new(
            Arc::new(CannedBackend(response)),
            "llama-3.1-8b-instant",
            Duration::from_secs(10),
            Arc::new(Metrics::new().unwrap()),
        )
    }

    #[tokio::test]
    async fn test_short_query_short_circuits() {
        // Backend would panic on use; short queries never reach it
        let c = classifier(Err(()));
        let verdict = c.classify("  hi  ").await;
        assert!(!verdict.is_confidential);
        assert_eq!(verdict.confidence, 0);
    }

    #[tokio::test]
    async fn test_parses_confidential_verdict() {
        let c = classifier(Ok(r#"{
            "is_confidential": true,
            "confidence": 95,
            "categories": ["pii", "financial"],
            "reason": "SSN present"
        }"#
        .to_string()));

        let verdict = c.classify("my SSN is 123-45-6789, summarize my taxes").await;
        assert!(verdict.is_confidential);
        assert_eq!(verdict.confidence, 95);
        assert_eq!(verdict.categories, vec!["pii", "financial"]);
        assert_eq!(verdict.reason, "SSN present");
    }

    #[tokio::test]
    async fn test_clamps_out_of_range_confidence() {
        let c = classifier(Ok(
            r#"{"is_confidential": true, "confidence": 900, "reason": "x"}"#.to_string(),
        ));
        let verdict = c.classify("my key is sk-abc123def").await;
        assert_eq!(verdict.confidence, 100);
    }

    #[tokio::test]
    async fn test_backend_error_degrades_to_safe_fallback() {
        let c = classifier(Err(()));
        let verdict = c.classify("what is the capital of France?").await;
        assert!(!verdict.is_confidential);
        assert!(verdict.reason.contains("unavailable"));
    }

    #[tokio::test]
    async fn test_garbage_response_defaults_to_non_confidential() {
        let c = classifier(Ok("I cannot comply with that request".to_string()));
        let verdict = c.classify("a perfectly normal question").await;
        assert!(!verdict.is_confidential);
        assert_eq!(verdict.reason, "No details provided");
    }
}
