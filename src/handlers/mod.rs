//! HTTP request handlers for the Promptgate API

use std::sync::Arc;
use std::time::Duration;

use crate::config::{Config, Secrets};
use crate::error::{AppError, AppResult};
use crate::metrics::Metrics;
use crate::router::RoutingOrchestrator;
use crate::upstream::{AuxLlmClient, Dispatcher, HttpDispatcher, HttpModelRegistry};

pub mod chat;
pub mod health;
pub mod metrics;
pub mod types;

/// Application state shared across all handlers.
///
/// Everything is behind `Arc`: Axum clones state per request and handlers
/// run concurrently, so sharing must be cheap and `Send + Sync`.
#[derive(Clone)]
pub struct AppState {
    config: Arc<Config>,
    orchestrator: Arc<RoutingOrchestrator>,
    dispatcher: Arc<dyn Dispatcher>,
    metrics: Arc<Metrics>,
}

impl AppState {
    /// Build production state from configuration and startup secrets.
    pub fn new(config: Arc<Config>, secrets: &Secrets) -> AppResult<Self> {
        let metrics = Arc::new(
            Metrics::new()
                .map_err(|e| AppError::Internal(format!("Failed to initialize metrics: {}", e)))?,
        );

        let backend = Arc::new(AuxLlmClient::new(
            config.routing.aux_base_url.clone(),
            secrets.aux_api_key.clone(),
        ));
        let registry = Arc::new(HttpModelRegistry::new(
            config.routing.registry_base_url.clone(),
            Duration::from_secs(config.timeouts.registry_seconds),
        ));
        let dispatcher: Arc<dyn Dispatcher> = Arc::new(HttpDispatcher::new(
            config.routing.backend_base_url.clone(),
            Duration::from_secs(config.timeouts.dispatch_seconds),
        ));

        let orchestrator = Arc::new(RoutingOrchestrator::new(
            backend,
            registry,
            &config.routing,
            &config.timeouts,
            secrets.confidential_model.clone(),
            metrics.clone(),
        ));

        Ok(Self {
            config,
            orchestrator,
            dispatcher,
            metrics,
        })
    }

    /// Assemble state from pre-built parts. This is the seam integration
    /// tests use to substitute mock upstreams.
    pub fn from_parts(
        config: Arc<Config>,
        orchestrator: Arc<RoutingOrchestrator>,
        dispatcher: Arc<dyn Dispatcher>,
        metrics: Arc<Metrics>,
    ) -> Self {
        Self {
            config,
            orchestrator,
            dispatcher,
            metrics,
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn orchestrator(&self) -> &RoutingOrchestrator {
        &self.orchestrator
    }

    pub fn dispatcher(&self) -> &dyn Dispatcher {
        self.dispatcher.as_ref()
    }

    pub fn metrics(&self) -> &Metrics {
        &self.metrics
    }
}
