//! Configuration management for Promptgate
//!
//! Structural settings come from a TOML file; secrets come from the
//! environment and are read exactly once at startup. A missing secret is a
//! startup failure, never a per-request fallback.

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::str::FromStr;

use crate::conversation::TruncationStrategy;
use crate::error::{AppError, AppResult};

/// Environment variable holding the API key for the classifier/selector/
/// enhancer endpoint.
pub const AUX_API_KEY_ENV: &str = "PROMPTGATE_AUX_API_KEY";

/// Environment variable naming the model that receives all confidential
/// queries.
pub const CONFIDENTIAL_MODEL_ENV: &str = "PROMPTGATE_CONFIDENTIAL_MODEL";

/// Root configuration structure
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    pub server: ServerConfig,
    pub routing: RoutingConfig,
    #[serde(default)]
    pub timeouts: TimeoutConfig,
    #[serde(default)]
    pub observability: ObservabilityConfig,
}

/// Server configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

/// Routing configuration: upstream endpoints and auxiliary model ids
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RoutingConfig {
    /// Base URL of the OpenAI-compatible endpoint serving the classifier,
    /// selector, and enhancer models.
    pub aux_base_url: String,
    /// Base URL of the backend pool that receives the final request.
    pub backend_base_url: String,
    /// Base URL of the model registry (`{base}/api/models`).
    pub registry_base_url: String,
    #[serde(default = "default_selector_model")]
    pub selector_model: String,
    #[serde(default = "default_enhancer_model")]
    pub enhancer_model: String,
    #[serde(default = "default_classifier_model")]
    pub classifier_model: String,
    #[serde(default)]
    pub truncation_strategy: TruncationStrategy,
    /// Summarize truncated history into a context note (extra aux call).
    #[serde(default)]
    pub enable_summarization: bool,
}

fn default_selector_model() -> String {
    "llama-3.1-8b-instant".to_string()
}

fn default_enhancer_model() -> String {
    "llama-3.1-8b-instant".to_string()
}

fn default_classifier_model() -> String {
    "llama-3.1-8b-instant".to_string()
}

/// Per-upstream timeout configuration (seconds)
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TimeoutConfig {
    #[serde(default = "default_classifier_timeout")]
    pub classifier_seconds: u64,
    #[serde(default = "default_selector_timeout")]
    pub selector_seconds: u64,
    #[serde(default = "default_enhancer_timeout")]
    pub enhancer_seconds: u64,
    #[serde(default = "default_registry_timeout")]
    pub registry_seconds: u64,
    #[serde(default = "default_dispatch_timeout")]
    pub dispatch_seconds: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            classifier_seconds: default_classifier_timeout(),
            selector_seconds: default_selector_timeout(),
            enhancer_seconds: default_enhancer_timeout(),
            registry_seconds: default_registry_timeout(),
            dispatch_seconds: default_dispatch_timeout(),
        }
    }
}

fn default_classifier_timeout() -> u64 {
    10
}

fn default_selector_timeout() -> u64 {
    15
}

fn default_enhancer_timeout() -> u64 {
    15
}

fn default_registry_timeout() -> u64 {
    5
}

fn default_dispatch_timeout() -> u64 {
    600
}

/// Observability configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ObservabilityConfig {
    #[serde(default = "default_log_level")]
    pub log_level: String,
    #[serde(default = "default_metrics_enabled")]
    pub metrics_enabled: bool,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            metrics_enabled: default_metrics_enabled(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_metrics_enabled() -> bool {
    true
}

/// Secrets loaded from the environment once at startup
#[derive(Debug, Clone)]
pub struct Secrets {
    pub aux_api_key: String,
    pub confidential_model: String,
}

impl Secrets {
    /// Read required secrets from the environment, failing fast when absent.
    pub fn from_env() -> AppResult<Self> {
        let aux_api_key = std::env::var(AUX_API_KEY_ENV).map_err(|_| {
            AppError::Config(format!(
                "{} environment variable not set. The router cannot authenticate \
                 classifier/selector/enhancer calls without it.",
                AUX_API_KEY_ENV
            ))
        })?;

        let confidential_model = std::env::var(CONFIDENTIAL_MODEL_ENV).map_err(|_| {
            AppError::Config(format!(
                "{} environment variable not set. Confidential queries have no \
                 routing target without it.",
                CONFIDENTIAL_MODEL_ENV
            ))
        })?;

        if aux_api_key.trim().is_empty() {
            return Err(AppError::Config(format!(
                "{} is set but empty",
                AUX_API_KEY_ENV
            )));
        }
        if confidential_model.trim().is_empty() {
            return Err(AppError::Config(format!(
                "{} is set but empty",
                CONFIDENTIAL_MODEL_ENV
            )));
        }

        Ok(Self {
            aux_api_key,
            confidential_model,
        })
    }
}

impl Config {
    /// Load configuration from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> AppResult<Self> {
        let content = std::fs::read_to_string(path.as_ref()).map_err(|e| {
            AppError::Config(format!(
                "Failed to read config file {}: {}",
                path.as_ref().display(),
                e
            ))
        })?;
        let config = Self::from_str(&content).map_err(|e| {
            AppError::Config(format!(
                "Failed to parse config file {}: {}",
                path.as_ref().display(),
                e
            ))
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Validate configuration after parsing
    fn validate(&self) -> AppResult<()> {
        for (name, url) in [
            ("routing.aux_base_url", &self.routing.aux_base_url),
            ("routing.backend_base_url", &self.routing.backend_base_url),
            ("routing.registry_base_url", &self.routing.registry_base_url),
        ] {
            if !url.starts_with("http://") && !url.starts_with("https://") {
                return Err(AppError::Config(format!(
                    "Configuration error: {} has invalid value '{}'. \
                     URLs must start with 'http://' or 'https://'.",
                    name, url
                )));
            }
        }

        for (name, model) in [
            ("routing.selector_model", &self.routing.selector_model),
            ("routing.enhancer_model", &self.routing.enhancer_model),
            ("routing.classifier_model", &self.routing.classifier_model),
        ] {
            if model.trim().is_empty() {
                return Err(AppError::Config(format!(
                    "Configuration error: {} must not be empty",
                    name
                )));
            }
        }

        for (name, value) in [
            ("timeouts.classifier_seconds", self.timeouts.classifier_seconds),
            ("timeouts.selector_seconds", self.timeouts.selector_seconds),
            ("timeouts.enhancer_seconds", self.timeouts.enhancer_seconds),
            ("timeouts.registry_seconds", self.timeouts.registry_seconds),
            ("timeouts.dispatch_seconds", self.timeouts.dispatch_seconds),
        ] {
            if value == 0 {
                return Err(AppError::Config(format!(
                    "Configuration error: {} must be greater than 0",
                    name
                )));
            }
        }

        Ok(())
    }
}

impl FromStr for Config {
    type Err = AppError;

    fn from_str(toml_str: &str) -> Result<Self, Self::Err> {
        toml::from_str(toml_str).map_err(|e| AppError::Config(format!("Invalid TOML: {}", e)))
    }
}
