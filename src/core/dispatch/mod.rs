//! Transformation dispatcher
//!
//! Performs exactly one provider call per work unit and translates the
//! provider's heterogeneous response shapes into a single normalized result.
//! Failures here are never retried; retry policy belongs to callers.

pub mod error;
pub mod models;
pub mod normalize;

pub use error::ProviderError;
pub use models::{model_spec, pose_reference_for, DispatchContext, ModelSpec, DEFAULT_MODEL};
pub use normalize::normalize_response;

use crate::config::ProviderConfig;
use crate::core::resolver::ImageRefResolver;
use crate::core::types::{TransformOutput, TransformationSettings, WorkUnit};
use crate::utils::error::Result;
use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, instrument};

/// Seam between the orchestrator and the provider call.
///
/// The production implementation is [`TransformDispatcher`]; tests substitute
/// deterministic stubs.
#[async_trait]
pub trait Dispatch: Send + Sync {
    async fn dispatch(
        &self,
        unit: &WorkUnit,
        prompt: &str,
        settings: &TransformationSettings,
    ) -> std::result::Result<TransformOutput, ProviderError>;
}

/// Dispatcher for the external image-transformation provider.
///
/// Configuration is injected at construction; there is no process-wide
/// client singleton.
pub struct TransformDispatcher {
    http: reqwest::Client,
    config: ProviderConfig,
    resolver: Arc<ImageRefResolver>,
}

impl TransformDispatcher {
    pub fn new(config: ProviderConfig, resolver: Arc<ImageRefResolver>) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(config.request_timeout())
            .build()?;
        Ok(Self {
            http,
            config,
            resolver,
        })
    }

    /// Fail fast on missing required fields, before any network call
    fn validate(unit: &WorkUnit, prompt: &str) -> std::result::Result<(), ProviderError> {
        if unit.id.trim().is_empty() {
            return Err(ProviderError::invalid_request("missing unit id"));
        }
        if prompt.trim().is_empty() {
            return Err(ProviderError::invalid_request("missing prompt"));
        }
        if unit.source_image.trim().is_empty() {
            return Err(ProviderError::invalid_request("missing source image reference"));
        }
        Ok(())
    }

    async fn execute(&self, endpoint: &str, body: &Value) -> std::result::Result<Value, ProviderError> {
        let url = format!("{}{}", self.config.api_base.trim_end_matches('/'), endpoint);
        debug!(%url, "dispatching transformation request");

        let response = self
            .http
            .post(&url)
            .header("Authorization", format!("Key {}", self.config.api_key))
            .json(body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    ProviderError::Timeout {
                        seconds: self.config.request_timeout_secs,
                    }
                } else {
                    ProviderError::network(e.to_string())
                }
            })?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| ProviderError::network(e.to_string()))?;

        if !status.is_success() {
            return Err(ProviderError::Http {
                status: status.as_u16(),
                body: truncate(&text, 512),
            });
        }

        serde_json::from_str(&text).map_err(|e| ProviderError::ResponseParsing {
            message: e.to_string(),
        })
    }
}

fn truncate(s: &str, max: usize) -> String {
    if s.len() <= max {
        s.to_string()
    } else {
        let mut end = max;
        while !s.is_char_boundary(end) {
            end -= 1;
        }
        format!("{}…", &s[..end])
    }
}

#[async_trait]
impl Dispatch for TransformDispatcher {
    #[instrument(skip(self, settings), fields(unit = %unit.id))]
    async fn dispatch(
        &self,
        unit: &WorkUnit,
        prompt: &str,
        settings: &TransformationSettings,
    ) -> std::result::Result<TransformOutput, ProviderError> {
        Self::validate(unit, prompt)?;

        let spec = model_spec(settings.model.as_deref()).ok_or_else(|| {
            ProviderError::invalid_request(format!(
                "unknown model: {}",
                settings.model.as_deref().unwrap_or_default()
            ))
        })?;

        let image_url = self.resolver.resolve(&unit.source_image).await;
        if ImageRefResolver::is_internal(&image_url) {
            // resolution fell back to the raw internal path; the provider
            // cannot fetch it, so abort before making the call
            return Err(ProviderError::invalid_request(format!(
                "source image could not be resolved to a fetchable URL: {}",
                image_url
            )));
        }

        let context = DispatchContext {
            image_url: &image_url,
            prompt,
            settings,
        };
        let body = (spec.build_body)(&context);

        let parsed = self.execute(spec.endpoint, &body).await?;
        normalize_response(&parsed)
    }
}
