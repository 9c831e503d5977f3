//! Alternative model scoring for recommendation envelopes
//!
//! When the router proposes a switch, up to two runner-up models are
//! offered alongside the primary recommendation, scored by intent affinity
//! and context window size.

use crate::handlers::types::AlternativeModel;
use crate::router::Intent;
use crate::upstream::registry::ModelDescriptor;

/// Baseline score for any candidate.
const BASE_SCORE: i32 = 50;

/// Bonus for an intent/id affinity match.
const AFFINITY_BONUS: i32 = 30;

/// Bonus for a large context window.
const LARGE_CONTEXT_BONUS: i32 = 10;

const LARGE_CONTEXT_THRESHOLD: usize = 100_000;

/// Score every active model other than the recommendation and return the
/// top two.
pub fn top_alternatives(
    intent: Intent,
    recommended_id: &str,
    available: &[ModelDescriptor],
) -> Vec<AlternativeModel> {
    let mut scored: Vec<(i32, &ModelDescriptor)> = available
        .iter()
        .filter(|m| m.id != recommended_id)
        .map(|m| (score(intent, m), m))
        .collect();

    scored.sort_by(|a, b| b.0.cmp(&a.0));

    scored
        .into_iter()
        .take(2)
        .map(|(_, m)| AlternativeModel {
            id: m.id.clone(),
            name: m.name.clone(),
            recommended_for: intent.as_str().to_string(),
        })
        .collect()
}

fn score(intent: Intent, model: &ModelDescriptor) -> i32 {
    let id = model.id.to_lowercase();
    let mut score = BASE_SCORE;

    let affinity = match intent {
        Intent::CodeGeneration => id.contains("qwen") || id.contains("code"),
        Intent::CreativeWriting => id.contains("llama") && id.contains("70b"),
        Intent::QuestionAnswering => id.contains("8b") || id.contains("instant"),
        Intent::Analysis => id.contains("70b"),
        _ => false,
    };
    if affinity {
        score += AFFINITY_BONUS;
    }

    if model.context_window > LARGE_CONTEXT_THRESHOLD {
        score += LARGE_CONTEXT_BONUS;
    }

    score
}
