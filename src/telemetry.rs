//! Telemetry and observability setup
//!
//! Configures structured logging with tracing and tracing-subscriber.

use std::sync::Once;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::ObservabilityConfig;

static INIT: Once = Once::new();

/// Initialize the tracing subscriber for structured logging.
///
/// Can only be called once per process; subsequent calls are ignored.
/// `RUST_LOG` takes precedence over the configured level. Without it, the
/// configured level applies to promptgate's own targets while the pooled
/// HTTP clients underneath (one per upstream) are held at `warn` so that
/// per-chunk stream noise does not drown the routing decisions.
pub fn init(observability: &ObservabilityConfig) {
    INIT.call_once(|| {
        let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(format!(
                "promptgate={},reqwest=warn,hyper=warn",
                observability.log_level
            ))
        });

        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer())
            .init();
    });
}
