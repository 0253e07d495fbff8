//! Provider error type
//!
//! Single error type for every failure mode of the external transformation
//! provider. Dispatch failures are never retried at this layer; retry and
//! backoff decisions belong to the orchestrator's caller.

/// Error returned by the transformation dispatcher
#[derive(Debug, Clone, thiserror::Error)]
pub enum ProviderError {
    /// A required field was missing or malformed; raised before any network call
    #[error("Invalid request: {message}")]
    InvalidRequest { message: String },

    /// The provider answered with a non-2xx status
    #[error("Provider returned HTTP {status}: {body}")]
    Http { status: u16, body: String },

    /// The request never produced an HTTP response
    #[error("Network error: {message}")]
    Network { message: String },

    /// The per-dispatch timeout elapsed before the provider answered
    #[error("Provider call timed out after {seconds}s")]
    Timeout { seconds: u64 },

    /// A 2xx body could not be parsed as JSON
    #[error("Failed to parse provider response: {message}")]
    ResponseParsing { message: String },

    /// The parsed body matched none of the known result shapes
    #[error("no image in response")]
    MissingImage,

    /// The batch was aborted before this unit was dispatched
    #[error("batch aborted before dispatch")]
    Aborted,
}

impl ProviderError {
    pub fn invalid_request(message: impl Into<String>) -> Self {
        Self::InvalidRequest {
            message: message.into(),
        }
    }

    pub fn network(message: impl Into<String>) -> Self {
        Self::Network {
            message: message.into(),
        }
    }

    /// Whether the failure happened before the request left the gateway
    pub fn is_local(&self) -> bool {
        matches!(self, Self::InvalidRequest { .. } | Self::Aborted)
    }
}
