//! Promptgate - intelligent model router and prompt conditioner
//!
//! Sits between a chat client and a pool of OpenAI-compatible LLM backends.
//! For each turn it classifies the query for confidential content, selects
//! the best backend model from a live registry, rewrites the prompt under
//! anti-drift guards, and fits the conversation to the chosen model's
//! context window before dispatching.

pub mod cli;
pub mod config;
pub mod conversation;
pub mod error;
pub mod handlers;
pub mod metrics;
pub mod middleware;
pub mod router;
pub mod telemetry;
pub mod tokens;
pub mod upstream;
