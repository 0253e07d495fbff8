//! Configuration management for the gateway
//!
//! Handles loading and validation of gateway configuration from YAML files
//! and environment variables. The provider client receives its configuration
//! explicitly at construction; there is no process-global client state.

use crate::core::resolver::ResolveStrategy;
use crate::utils::error::{EngineError, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use tracing::{debug, info, warn};
use url::Url;

/// Top-level gateway configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GatewayConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub provider: ProviderConfig,
    #[serde(default)]
    pub batch: BatchConfig,
    #[serde(default)]
    pub resolver: ResolverConfig,
}

/// HTTP server settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

/// External transformation provider settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    /// API key sent as `Authorization: Key …`
    #[serde(default)]
    pub api_key: String,
    #[serde(default = "default_api_base")]
    pub api_base: String,
    /// Per-dispatch timeout; a stalled provider call fails the unit
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

/// Batch orchestration settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchConfig {
    /// Maximum number of in-flight provider calls per chunk
    #[serde(default = "default_concurrency_limit")]
    pub concurrency_limit: usize,
    /// Pause between chunks, skipped after the final chunk
    #[serde(default = "default_pacing_delay_ms")]
    pub pacing_delay_ms: u64,
}

/// Image reference resolution settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResolverConfig {
    #[serde(default)]
    pub strategy: ResolveStrategy,
    /// Externally reachable base URL of this gateway, used for proxy URLs
    #[serde(default = "default_public_base_url")]
    pub public_base_url: String,
    #[serde(default = "default_bucket")]
    pub bucket: String,
    #[serde(default = "default_sign_ttl_secs")]
    pub sign_ttl_secs: u64,
    /// Signing sidecar endpoint; required for the `signed` strategy
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub signer_endpoint: Option<String>,
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}
fn default_port() -> u16 {
    8080
}
fn default_api_base() -> String {
    "https://fal.run".to_string()
}
fn default_request_timeout_secs() -> u64 {
    60
}
fn default_concurrency_limit() -> usize {
    3
}
fn default_pacing_delay_ms() -> u64 {
    500
}
fn default_public_base_url() -> String {
    "http://127.0.0.1:8080".to_string()
}
fn default_bucket() -> String {
    "imgedit".to_string()
}
fn default_sign_ttl_secs() -> u64 {
    3600
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            api_base: default_api_base(),
            request_timeout_secs: default_request_timeout_secs(),
        }
    }
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            concurrency_limit: default_concurrency_limit(),
            pacing_delay_ms: default_pacing_delay_ms(),
        }
    }
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            strategy: ResolveStrategy::default(),
            public_base_url: default_public_base_url(),
            bucket: default_bucket(),
            sign_ttl_secs: default_sign_ttl_secs(),
            signer_endpoint: None,
        }
    }
}

impl ProviderConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

impl BatchConfig {
    pub fn pacing_delay(&self) -> Duration {
        Duration::from_millis(self.pacing_delay_ms)
    }
}

impl GatewayConfig {
    /// Load configuration from a YAML file
    pub async fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        info!("Loading configuration from: {:?}", path);

        let content = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| EngineError::Config(format!("Failed to read config file: {}", e)))?;

        let config: GatewayConfig = serde_yaml::from_str(&content)
            .map_err(|e| EngineError::Config(format!("Failed to parse config: {}", e)))?;

        config.validate()?;
        debug!("Configuration loaded successfully");
        Ok(config)
    }

    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        info!("Loading configuration from environment variables");

        let mut config = GatewayConfig::default();

        if let Ok(host) = std::env::var("GATEWAY_HOST") {
            config.server.host = host;
        }
        if let Ok(port) = std::env::var("GATEWAY_PORT") {
            config.server.port = port
                .parse()
                .map_err(|_| EngineError::Config(format!("Invalid GATEWAY_PORT: {}", port)))?;
        }
        if let Ok(key) = std::env::var("FAL_API_KEY") {
            config.provider.api_key = key;
        }
        if let Ok(base) = std::env::var("FAL_API_BASE") {
            config.provider.api_base = base;
        }
        if let Ok(timeout) = std::env::var("PROVIDER_TIMEOUT_SECS") {
            config.provider.request_timeout_secs = timeout.parse().map_err(|_| {
                EngineError::Config(format!("Invalid PROVIDER_TIMEOUT_SECS: {}", timeout))
            })?;
        }
        if let Ok(limit) = std::env::var("BATCH_CONCURRENCY_LIMIT") {
            config.batch.concurrency_limit = limit.parse().map_err(|_| {
                EngineError::Config(format!("Invalid BATCH_CONCURRENCY_LIMIT: {}", limit))
            })?;
        }
        if let Ok(base) = std::env::var("PUBLIC_BASE_URL") {
            config.resolver.public_base_url = base;
        }
        if let Ok(endpoint) = std::env::var("SIGNER_ENDPOINT") {
            config.resolver.strategy = ResolveStrategy::Signed;
            config.resolver.signer_endpoint = Some(endpoint);
        }

        config.validate()?;
        Ok(config)
    }

    /// Validate the entire configuration
    pub fn validate(&self) -> Result<()> {
        validate_http_url("provider.api_base", &self.provider.api_base)?;
        validate_http_url("resolver.public_base_url", &self.resolver.public_base_url)?;
        if let Some(endpoint) = &self.resolver.signer_endpoint {
            validate_http_url("resolver.signer_endpoint", endpoint)?;
        }
        if self.batch.concurrency_limit == 0 {
            return Err(EngineError::Config(
                "batch.concurrency_limit must be at least 1".to_string(),
            ));
        }
        if self.provider.request_timeout_secs == 0 {
            return Err(EngineError::Config(
                "provider.request_timeout_secs must be at least 1".to_string(),
            ));
        }
        if self.resolver.sign_ttl_secs == 0 {
            return Err(EngineError::Config(
                "resolver.sign_ttl_secs must be at least 1".to_string(),
            ));
        }
        if self.resolver.strategy == ResolveStrategy::Signed
            && self.resolver.signer_endpoint.is_none()
        {
            return Err(EngineError::Config(
                "resolver.signer_endpoint is required for the signed strategy".to_string(),
            ));
        }
        if self.provider.api_key.is_empty() {
            warn!("provider.api_key is empty; transformation dispatches will be rejected upstream");
        }
        Ok(())
    }
}

fn validate_http_url(field: &str, value: &str) -> Result<()> {
    let url = Url::parse(value)
        .map_err(|e| EngineError::Config(format!("{} is not a valid URL: {}", field, e)))?;
    if url.scheme() != "http" && url.scheme() != "https" {
        return Err(EngineError::Config(format!(
            "{} must be an http(s) URL, got scheme {}",
            field,
            url.scheme()
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[tokio::test]
    async fn test_config_from_file() {
        let config_content = r#"
server:
  host: "0.0.0.0"
  port: 9090

provider:
  api_key: "test-key"
  api_base: "https://fal.run"
  request_timeout_secs: 30

batch:
  concurrency_limit: 5
  pacing_delay_ms: 250

resolver:
  strategy: "proxy"
  public_base_url: "https://edit.example.com"
"#;

        let mut temp_file = NamedTempFile::new().unwrap();
        temp_file.write_all(config_content.as_bytes()).unwrap();

        let config = GatewayConfig::from_file(temp_file.path()).await.unwrap();
        assert_eq!(config.server.host, "0.0.0.0");
        assert_eq!(config.server.port, 9090);
        assert_eq!(config.provider.api_key, "test-key");
        assert_eq!(config.batch.concurrency_limit, 5);
        assert_eq!(config.batch.pacing_delay(), Duration::from_millis(250));
        assert_eq!(config.resolver.public_base_url, "https://edit.example.com");
    }

    #[test]
    fn test_default_config_is_valid() {
        let config = GatewayConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.batch.concurrency_limit, 3);
        assert_eq!(config.batch.pacing_delay_ms, 500);
        assert_eq!(config.provider.request_timeout_secs, 60);
        assert_eq!(config.resolver.sign_ttl_secs, 3600);
    }

    #[test]
    fn test_zero_concurrency_rejected() {
        let mut config = GatewayConfig::default();
        config.batch.concurrency_limit = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_malformed_urls_rejected() {
        let mut config = GatewayConfig::default();
        config.provider.api_base = "not a url".to_string();
        assert!(config.validate().is_err());

        let mut config = GatewayConfig::default();
        config.resolver.public_base_url = "ftp://gateway.example.com".to_string();
        assert!(config.validate().is_err());

        let mut config = GatewayConfig::default();
        config.resolver.signer_endpoint = Some("//missing-scheme/sign".to_string());
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_signed_strategy_requires_endpoint() {
        let mut config = GatewayConfig::default();
        config.resolver.strategy = ResolveStrategy::Signed;
        assert!(config.validate().is_err());

        config.resolver.signer_endpoint = Some("http://localhost:1106/sign".to_string());
        assert!(config.validate().is_ok());
    }
}
