//! Command-line interface for Promptgate
//!
//! Provides argument parsing and subcommand handling for the binary.

use clap::{Parser, Subcommand};

/// Intelligent model router and prompt conditioner for LLM backends
#[derive(Parser)]
#[command(name = "promptgate")]
#[command(version)]
#[command(about = "Intelligent model router and prompt conditioner for LLM backends")]
#[command(
    long_about = "Promptgate sits between a chat client and a pool of OpenAI-compatible \
    LLM backends. For each turn it classifies the query for confidential content, picks \
    the best backend model, rewrites the prompt under anti-drift guards, and fits the \
    conversation into the chosen model's context window."
)]
pub struct Cli {
    /// Path to configuration file
    #[arg(short, long, default_value = "config.toml", global = true)]
    pub config: String,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand)]
pub enum Command {
    /// Generate a template configuration file
    Config {
        /// Output file path (prints to stdout if not specified)
        #[arg(short, long)]
        output: Option<String>,
    },
}

/// Generate template configuration content
pub fn generate_config_template() -> &'static str {
    r#"# Promptgate Configuration
# ========================
#
# Secrets are NOT stored here. Two environment variables are required at
# startup:
#   PROMPTGATE_AUX_API_KEY       - key for the classifier/selector/enhancer endpoint
#   PROMPTGATE_CONFIDENTIAL_MODEL - model id that receives confidential queries

[server]
# IP address to bind to (0.0.0.0 for all interfaces)
host = "0.0.0.0"

# Port to listen on
port = 3000

[routing]
# OpenAI-compatible endpoint serving the auxiliary models
aux_base_url = "https://api.groq.com/openai/v1"

# Backend pool that receives the final chat completion
backend_base_url = "https://api.groq.com/openai/v1"

# Model registry host (queried at {base}/api/models per request)
registry_base_url = "http://localhost:8080"

# Auxiliary model ids
selector_model = "llama-3.1-8b-instant"
enhancer_model = "llama-3.1-8b-instant"
classifier_model = "llama-3.1-8b-instant"

# History truncation: "sliding_window" (recent messages) or
# "importance_based" (first user message + recent messages)
truncation_strategy = "sliding_window"

# Summarize truncated history into a context note (one extra aux call)
enable_summarization = false

[timeouts]
classifier_seconds = 10
selector_seconds = 15
enhancer_seconds = 15
registry_seconds = 5
dispatch_seconds = 600

[observability]
# Log level: trace, debug, info, warn, error (RUST_LOG overrides)
log_level = "info"

# Expose Prometheus metrics at /metrics
metrics_enabled = true
"#
}
