//! Application state shared across HTTP handlers

use crate::config::GatewayConfig;
use crate::core::batch::{BatchOptions, BatchOrchestrator};
use crate::core::dispatch::{Dispatch, TransformDispatcher};
use crate::core::resolver::{HttpUrlSigner, ImageRefResolver, UnconfiguredSigner, UrlSigner};
use crate::storage::{
    InMemoryObjectStore, InMemorySessionStore, InMemoryTemplateStore, ObjectStore, SessionStore,
    TemplateStore,
};
use crate::utils::error::Result;
use std::sync::Arc;

/// Shared resources handed to every request handler
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<GatewayConfig>,
    pub sessions: Arc<dyn SessionStore>,
    pub objects: Arc<dyn ObjectStore>,
    pub templates: Arc<dyn TemplateStore>,
    pub dispatcher: Arc<dyn Dispatch>,
    pub orchestrator: Arc<BatchOrchestrator>,
}

impl AppState {
    /// Wire the default component graph from configuration
    pub fn new(config: GatewayConfig) -> Result<Self> {
        let sessions: Arc<dyn SessionStore> = Arc::new(InMemorySessionStore::new());
        let objects: Arc<dyn ObjectStore> = Arc::new(InMemoryObjectStore::new());
        let templates: Arc<dyn TemplateStore> = Arc::new(InMemoryTemplateStore::seeded());

        let signer: Arc<dyn UrlSigner> = match &config.resolver.signer_endpoint {
            Some(endpoint) => Arc::new(HttpUrlSigner::new(reqwest::Client::new(), endpoint.clone())),
            None => Arc::new(UnconfiguredSigner),
        };
        let resolver = Arc::new(ImageRefResolver::new(
            signer,
            config.resolver.strategy,
            config.resolver.bucket.clone(),
            config.resolver.public_base_url.clone(),
            config.resolver.sign_ttl_secs,
        ));

        let dispatcher: Arc<dyn Dispatch> =
            Arc::new(TransformDispatcher::new(config.provider.clone(), resolver)?);

        let orchestrator = Arc::new(BatchOrchestrator::new(
            dispatcher.clone(),
            sessions.clone(),
            BatchOptions::from_config(&config.batch, config.provider.request_timeout()),
        ));

        Ok(Self {
            config: Arc::new(config),
            sessions,
            objects,
            templates,
            dispatcher,
            orchestrator,
        })
    }

    /// Build state over explicit collaborators (used by tests)
    pub fn with_components(
        config: GatewayConfig,
        sessions: Arc<dyn SessionStore>,
        objects: Arc<dyn ObjectStore>,
        dispatcher: Arc<dyn Dispatch>,
    ) -> Self {
        let orchestrator = Arc::new(BatchOrchestrator::new(
            dispatcher.clone(),
            sessions.clone(),
            BatchOptions::from_config(&config.batch, config.provider.request_timeout()),
        ));
        Self {
            config: Arc::new(config),
            sessions,
            objects,
            templates: Arc::new(InMemoryTemplateStore::seeded()),
            dispatcher,
            orchestrator,
        }
    }
}
