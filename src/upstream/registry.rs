//! Model registry client
//!
//! Fetches the list of routable models per request. The registry is
//! authoritative for which ids may be recommended; the inbound request's
//! bearer token is passed through so registry-side visibility rules apply.

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;

use super::UpstreamError;
use crate::tokens;

/// A routable model as reported by the registry
#[derive(Debug, Clone, PartialEq)]
pub struct ModelDescriptor {
    pub id: String,
    pub name: String,
    pub owned_by: String,
    pub context_window: usize,
    pub capabilities: Vec<String>,
    pub is_active: bool,
}

/// Seam for the registry endpoint.
#[async_trait]
pub trait ModelRegistry: Send + Sync {
    /// Fetch active models. Errors are returned so the caller can count the
    /// degradation; the degraded value is always the empty list.
    async fn list_active_models(
        &self,
        bearer: Option<&str>,
    ) -> Result<Vec<ModelDescriptor>, UpstreamError>;
}

/// HTTP registry client (`GET {base}/api/models`)
#[derive(Debug, Clone)]
pub struct HttpModelRegistry {
    client: reqwest::Client,
    base_url: String,
    timeout: Duration,
}

impl HttpModelRegistry {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into(),
            timeout,
        }
    }
}

#[derive(Debug, Deserialize)]
struct RawModelList {
    #[serde(default)]
    data: Vec<RawModel>,
}

#[derive(Debug, Deserialize)]
struct RawModel {
    id: String,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    owned_by: Option<String>,
    #[serde(default)]
    context_window: Option<usize>,
    #[serde(default)]
    info: RawModelInfo,
}

#[derive(Debug, Deserialize)]
struct RawModelInfo {
    #[serde(default = "default_true")]
    is_active: bool,
    #[serde(default)]
    meta: RawModelMeta,
}

impl Default for RawModelInfo {
    fn default() -> Self {
        Self {
            is_active: default_true(),
            meta: RawModelMeta::default(),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
struct RawModelMeta {
    #[serde(default)]
    capabilities: serde_json::Map<String, Value>,
}

fn default_true() -> bool {
    true
}

impl RawModel {
    fn into_descriptor(self) -> ModelDescriptor {
        let context_window = self
            .context_window
            .unwrap_or_else(|| tokens::limit_for(&self.id));
        let capabilities = self
            .info
            .meta
            .capabilities
            .iter()
            .filter(|(_, enabled)| enabled.as_bool().unwrap_or(false))
            .map(|(tag, _)| tag.clone())
            .collect();

        ModelDescriptor {
            name: self.name.unwrap_or_else(|| self.id.clone()),
            owned_by: self.owned_by.unwrap_or_else(|| "unknown".to_string()),
            context_window,
            capabilities,
            is_active: self.info.is_active,
            id: self.id,
        }
    }
}

#[async_trait]
impl ModelRegistry for HttpModelRegistry {
    async fn list_active_models(
        &self,
        bearer: Option<&str>,
    ) -> Result<Vec<ModelDescriptor>, UpstreamError> {
        let url = format!("{}/api/models", self.base_url.trim_end_matches('/'));

        let mut request = self.client.get(&url).timeout(self.timeout);
        if let Some(token) = bearer {
            request = request.bearer_auth(token);
        }

        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(UpstreamError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let list: RawModelList = response.json().await?;
        let models: Vec<ModelDescriptor> = list
            .data
            .into_iter()
            .filter(|m| m.info.is_active)
            .map(RawModel::into_descriptor)
            .collect();

        tracing::debug!(count = models.len(), "fetched active models from registry");

        Ok(models)
    }
}
