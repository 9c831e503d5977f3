//! Approximate token accounting for budget decisions
//!
//! Estimates are compared against per-model budgets; they only need to be
//! monotone and deterministic, not exact. Every component that counts tokens
//! goes through these functions so budget math stays consistent.

use crate::handlers::types::ChatMessage;

/// Average characters per token for English-ish text.
const AVG_CHARS_PER_TOKEN: usize = 4;

/// Per-message overhead (role tag, separators).
pub const TOKENS_PER_MESSAGE: usize = 4;

/// Default context window when a model id matches nothing in the table.
pub const DEFAULT_TOKEN_LIMIT: usize = 4096;

/// Known context windows, matched by substring against the model id.
const MODEL_TOKEN_LIMITS: &[(&str, usize)] = &[
    ("llama-3.1-8b-instant", 8000),
    ("llama-3.1-70b-versatile", 128_000),
    ("llama-3.3-70b-versatile", 128_000),
    ("mixtral-8x7b-32768", 32_768),
    ("gemma-7b-it", 8192),
];

/// Estimate the token count of a text fragment.
///
/// Uses the larger of a character-based and a word-based estimate: the
/// character estimate undercounts whitespace-heavy text, the word estimate
/// undercounts long identifiers.
pub fn estimate(text: &str) -> usize {
    if text.is_empty() {
        return 0;
    }

    let char_estimate = text.chars().count() / AVG_CHARS_PER_TOKEN;
    let word_estimate = (text.split_whitespace().count() as f64 * 1.3).ceil() as usize;

    char_estimate.max(word_estimate)
}

/// Estimate the total token count of a message list, including per-message
/// overhead.
pub fn estimate_messages(messages: &[ChatMessage]) -> usize {
    messages
        .iter()
        .map(|m| estimate(m.content()) + TOKENS_PER_MESSAGE)
        .sum()
}

/// Resolve the context window for a model id.
///
/// Matches case-insensitively by substring so versioned ids
/// (`provider/llama-3.1-8b-instant:latest`) still resolve.
pub fn limit_for(model_id: &str) -> usize {
    let lowered = model_id.to_lowercase();
    for (key, limit) in MODEL_TOKEN_LIMITS {
        if lowered.contains(key) {
            return *limit;
        }
    }
    DEFAULT_TOKEN_LIMIT
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handlers::types::{ChatMessage, MessageRole};

    #[test]
    fn test_estimate_empty_is_zero() {
        assert_eq!(estimate(""), 0);
    }

    #[test]
    fn test_estimate_uses_char_count_for_long_words() {
        // 40 chars, 1 word: char estimate 10 beats word estimate 2
        let text = "a".repeat(40);
        assert_eq!(estimate(&text), 10);
    }

    #[test]
    fn test_estimate_uses_word_count_for_short_words() {
        // 10 words of 1 char each = 19 chars -> char estimate 4, word estimate 13
        let text = "a b c d e f g h i j";
        assert_eq!(estimate(text), 13);
    }

    #[test]
    fn test_estimate_is_monotone_in_length() {
        let short = "explain merge sort";
        let long = "explain merge sort with a worked example and complexity analysis";
        assert!(estimate(long) > estimate(short));
    }

    #[test]
    fn test_estimate_messages_adds_overhead() {
        let messages = vec![
            ChatMessage::new(MessageRole::User, "hello there friend"),
            ChatMessage::new(MessageRole::Assistant, "hi"),
        ];
        let content_tokens: usize = messages.iter().map(|m| estimate(m.content())).sum();
        assert_eq!(
            estimate_messages(&messages),
            content_tokens + 2 * TOKENS_PER_MESSAGE
        );
    }

    #[test]
    fn test_limit_for_known_models() {
        assert_eq!(limit_for("llama-3.1-8b-instant"), 8000);
        assert_eq!(limit_for("llama-3.3-70b-versatile"), 128_000);
        assert_eq!(limit_for("mixtral-8x7b-32768"), 32_768);
    }

    #[test]
    fn test_limit_for_matches_substring_and_case() {
        assert_eq!(limit_for("groq/LLAMA-3.1-8B-INSTANT"), 8000);
        assert_eq!(limit_for("Gemma-7b-It-v2"), 8192);
    }

    #[test]
    fn test_limit_for_unknown_uses_default() {
        assert_eq!(limit_for("some-unknown-model"), DEFAULT_TOKEN_LIMIT);
    }
}
