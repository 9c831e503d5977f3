//! Conversation history management
//!
//! Fits a message list into the target model's context window while always
//! preserving system messages and the latest user message. Truncation is
//! total: it never fails, even when the budget is impossible to satisfy
//! (the backend owns rejection in that case).

use serde::{Deserialize, Serialize};

use crate::handlers::types::{ChatMessage, MessageRole};
use crate::tokens;

/// Ceiling on history tokens regardless of model size.
const MAX_HISTORY_TOKENS: usize = 4000;

/// Tokens reserved for the model's response.
const RESERVED_COMPLETION_TOKENS: usize = 1500;

/// How to reduce a conversation that exceeds the budget
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TruncationStrategy {
    /// Keep the most recent messages that fit (default)
    #[default]
    SlidingWindow,
    /// Keep system + first user message + the last four messages
    ImportanceBased,
}

/// Per-request manager bound to one model's token budget
#[derive(Debug, Clone)]
pub struct ConversationManager {
    max_history_tokens: usize,
}

impl ConversationManager {
    /// Build a manager for the given model, resolving its context window
    /// from the built-in limit table.
    pub fn for_model(model_id: &str) -> Self {
        let limit = tokens::limit_for(model_id);
        let max_history_tokens =
            MAX_HISTORY_TOKENS.min(limit.saturating_sub(RESERVED_COMPLETION_TOKENS));
        Self { max_history_tokens }
    }

    /// The history budget in tokens (system messages included).
    pub fn max_history_tokens(&self) -> usize {
        self.max_history_tokens
    }

    /// Truncate `messages` to fit the budget using the given strategy.
    ///
    /// Ordering is preserved within the kept set.
    pub fn truncate(
        &self,
        messages: &[ChatMessage],
        strategy: TruncationStrategy,
    ) -> Vec<ChatMessage> {
        match strategy {
            TruncationStrategy::SlidingWindow => self.sliding_window(messages),
            TruncationStrategy::ImportanceBased => self.importance_based(messages),
        }
    }

    /// Keep the most recent conversation suffix that fits, anchored on the
    /// last user message.
    fn sliding_window(&self, messages: &[ChatMessage]) -> Vec<ChatMessage> {
        let (system, conversation): (Vec<_>, Vec<_>) =
            messages.iter().cloned().partition(|m| m.is_system());

        if conversation.is_empty() {
            return messages.to_vec();
        }

        let Some(last_user_idx) = conversation.iter().rposition(|m| m.is_user()) else {
            let mut result = system;
            result.extend(conversation);
            return result;
        };

        let system_tokens = tokens::estimate_messages(&system);
        let available = self.max_history_tokens.saturating_sub(system_tokens);

        // Seed with the last user message; it is kept even over budget.
        let mut kept = vec![conversation[last_user_idx].clone()];
        let mut current = tokens::estimate_messages(&kept);

        for msg in conversation[..last_user_idx].iter().rev() {
            let msg_tokens = tokens::estimate(msg.content()) + tokens::TOKENS_PER_MESSAGE;
            if current + msg_tokens > available {
                tracing::debug!(
                    removed = conversation.len() - kept.len(),
                    "truncated older conversation history"
                );
                break;
            }
            kept.insert(0, msg.clone());
            current += msg_tokens;
        }

        let mut result = system;
        result.extend(kept);
        result
    }

    /// Keep system messages, the first user message, and the last four
    /// messages, marking the gap with a synthetic system note.
    fn importance_based(&self, messages: &[ChatMessage]) -> Vec<ChatMessage> {
        let (system, conversation): (Vec<_>, Vec<_>) =
            messages.iter().cloned().partition(|m| m.is_system());

        if conversation.len() <= 3 {
            return messages.to_vec();
        }

        let first_user = conversation.iter().find(|m| m.is_user()).cloned();
        let recent: Vec<ChatMessage> =
            conversation[conversation.len().saturating_sub(4)..].to_vec();

        let system_tokens = tokens::estimate_messages(&system);
        let available = self.max_history_tokens.saturating_sub(system_tokens);

        let priority: Vec<ChatMessage> = first_user.iter().cloned().collect();
        let priority_tokens = tokens::estimate_messages(&priority);
        let recent_tokens = tokens::estimate_messages(&recent);

        if priority_tokens + recent_tokens <= available {
            let gap = conversation.len().saturating_sub(5);
            if gap > 0 {
                let marker = ChatMessage::new(
                    MessageRole::System,
                    format!("[{} messages truncated for context]", gap),
                );
                let mut result = system;
                result.extend(priority);
                result.push(marker);
                result.extend(recent);
                return result;
            }
            return messages.to_vec();
        }

        tracing::debug!("history over budget, keeping recent messages only");
        let mut result = system;
        result.extend(recent);
        result
    }

    /// Insert a context summary as a system message immediately after any
    /// existing system messages.
    pub fn add_context_summary(
        &self,
        messages: &[ChatMessage],
        summary: &str,
    ) -> Vec<ChatMessage> {
        let summary_msg =
            ChatMessage::new(MessageRole::System, format!("Context summary: {}", summary));

        let (mut system, conversation): (Vec<_>, Vec<_>) =
            messages.iter().cloned().partition(|m| m.is_system());

        system.push(summary_msg);
        system.extend(conversation);
        system
    }
}
