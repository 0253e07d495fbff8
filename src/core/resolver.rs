//! Image reference resolver
//!
//! Turns an opaque stored-object reference into a URL the transformation
//! provider (or a browser) can dereference. Resolution is best-effort and
//! never fails: when the signing service is unreachable the original
//! reference is returned unchanged and the failure is logged as recoverable.
//! Callers must treat a result that still looks like an internal path as a
//! resolution failure.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, warn};

/// Prefix under which private objects are addressed internally
pub const OBJECTS_PREFIX: &str = "/objects/";

/// HTTP method a signed URL will be used with
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignMethod {
    Get,
    Put,
}

impl SignMethod {
    fn as_str(self) -> &'static str {
        match self {
            SignMethod::Get => "GET",
            SignMethod::Put => "PUT",
        }
    }
}

/// Signing service failure; always recovered by the resolver
#[derive(Debug, thiserror::Error)]
pub enum SignerError {
    #[error("signer request failed: {0}")]
    Request(String),
    #[error("signer returned HTTP {0}")]
    Status(u16),
    #[error("malformed signer response: {0}")]
    Malformed(String),
}

/// Storage-signing service: bucket/object pair → short-lived signed URL
#[async_trait]
pub trait UrlSigner: Send + Sync {
    async fn sign(
        &self,
        bucket: &str,
        object: &str,
        method: SignMethod,
        ttl_secs: u64,
    ) -> Result<String, SignerError>;
}

/// Signer backed by an HTTP signing sidecar
pub struct HttpUrlSigner {
    http: reqwest::Client,
    endpoint: String,
}

impl HttpUrlSigner {
    pub fn new(http: reqwest::Client, endpoint: impl Into<String>) -> Self {
        Self {
            http,
            endpoint: endpoint.into(),
        }
    }
}

#[derive(Serialize)]
struct SignRequest<'a> {
    bucket_name: &'a str,
    object_name: &'a str,
    method: &'a str,
    expires_at_seconds: u64,
}

#[derive(Deserialize)]
struct SignResponse {
    signed_url: String,
}

#[async_trait]
impl UrlSigner for HttpUrlSigner {
    async fn sign(
        &self,
        bucket: &str,
        object: &str,
        method: SignMethod,
        ttl_secs: u64,
    ) -> Result<String, SignerError> {
        let request = SignRequest {
            bucket_name: bucket,
            object_name: object,
            method: method.as_str(),
            expires_at_seconds: ttl_secs,
        };

        let response = self
            .http
            .post(&self.endpoint)
            .json(&request)
            .send()
            .await
            .map_err(|e| SignerError::Request(e.to_string()))?;

        if !response.status().is_success() {
            return Err(SignerError::Status(response.status().as_u16()));
        }

        let body: SignResponse = response
            .json()
            .await
            .map_err(|e| SignerError::Malformed(e.to_string()))?;
        Ok(body.signed_url)
    }
}

/// Placeholder signer for deployments without a signing service.
///
/// Always errors, which drives the resolver down its fallback path.
pub struct UnconfiguredSigner;

#[async_trait]
impl UrlSigner for UnconfiguredSigner {
    async fn sign(
        &self,
        _bucket: &str,
        _object: &str,
        _method: SignMethod,
        _ttl_secs: u64,
    ) -> Result<String, SignerError> {
        Err(SignerError::Request("no signing service configured".to_string()))
    }
}

/// How internal object paths are made externally fetchable
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ResolveStrategy {
    /// Request a short-lived signed URL from the signing service
    Signed,
    /// Rewrite to a same-origin URL that streams the private object
    #[default]
    Proxy,
}

/// Resolves image references into provider-fetchable URLs
pub struct ImageRefResolver {
    signer: Arc<dyn UrlSigner>,
    strategy: ResolveStrategy,
    bucket: String,
    public_base_url: String,
    sign_ttl_secs: u64,
}

impl ImageRefResolver {
    pub fn new(
        signer: Arc<dyn UrlSigner>,
        strategy: ResolveStrategy,
        bucket: impl Into<String>,
        public_base_url: impl Into<String>,
        sign_ttl_secs: u64,
    ) -> Self {
        Self {
            signer,
            strategy,
            bucket: bucket.into(),
            public_base_url: public_base_url.into(),
            sign_ttl_secs,
        }
    }

    /// Whether a reference is an internal object path rather than a URL
    pub fn is_internal(reference: &str) -> bool {
        reference.starts_with(OBJECTS_PREFIX)
    }

    /// Resolve a reference to a fetchable URL.
    ///
    /// Already-public URLs pass through untouched. Internal paths are signed
    /// or proxied per the configured strategy. On signer failure the original
    /// reference comes back unchanged with a warning.
    pub async fn resolve(&self, reference: &str) -> String {
        if reference.starts_with("http://") || reference.starts_with("https://") {
            return reference.to_string();
        }

        if !Self::is_internal(reference) {
            debug!(reference, "reference is neither a URL nor an object path; passing through");
            return reference.to_string();
        }

        match self.strategy {
            ResolveStrategy::Proxy => self.proxy_url(reference),
            ResolveStrategy::Signed => {
                let object = &reference[OBJECTS_PREFIX.len()..];
                match self
                    .signer
                    .sign(&self.bucket, object, SignMethod::Get, self.sign_ttl_secs)
                    .await
                {
                    Ok(url) => url,
                    Err(e) => {
                        warn!(reference, error = %e, "failed to sign object URL; returning reference unchanged");
                        reference.to_string()
                    }
                }
            }
        }
    }

    fn proxy_url(&self, reference: &str) -> String {
        format!(
            "{}{}",
            self.public_base_url.trim_end_matches('/'),
            reference
        )
    }
}
