//! Error handling for the gateway
//!
//! This module defines the crate-wide error type and result alias.

use crate::core::dispatch::ProviderError;
use actix_web::{HttpResponse, ResponseError};
use thiserror::Error;

/// Result type alias for the gateway
pub type Result<T> = std::result::Result<T, EngineError>;

/// Main error type for the gateway
#[derive(Error, Debug)]
pub enum EngineError {
    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Validation errors (fail fast, before any network call)
    #[error("Validation error: {0}")]
    Validation(String),

    /// Not found errors
    #[error("Not found: {0}")]
    NotFound(String),

    /// Session/object persistence errors
    #[error("Storage error: {0}")]
    Storage(String),

    /// External transformation provider errors
    #[error("Provider error: {0}")]
    Provider(#[from] ProviderError),

    /// Serialization errors
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// YAML parsing errors
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// HTTP client errors
    #[error("HTTP client error: {0}")]
    HttpClient(#[from] reqwest::Error),

    /// Internal errors
    #[error("Internal error: {0}")]
    Internal(String),
}

impl ResponseError for EngineError {
    fn error_response(&self) -> HttpResponse {
        let (status, code) = match self {
            EngineError::Validation(_) => (actix_web::http::StatusCode::BAD_REQUEST, "validation_error"),
            EngineError::NotFound(_) => (actix_web::http::StatusCode::NOT_FOUND, "not_found"),
            EngineError::Provider(_) => (actix_web::http::StatusCode::BAD_GATEWAY, "provider_error"),
            EngineError::Config(_) => (actix_web::http::StatusCode::INTERNAL_SERVER_ERROR, "config_error"),
            _ => (
                actix_web::http::StatusCode::INTERNAL_SERVER_ERROR,
                "internal_error",
            ),
        };

        HttpResponse::build(status).json(serde_json::json!({
            "error": {
                "code": code,
                "message": self.to_string(),
            }
        }))
    }
}
