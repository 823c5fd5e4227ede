//! Model error types

use std::time::Duration;

use thiserror::Error;

/// Errors from a language-model call
#[derive(Error, Debug)]
pub enum ProviderError {
    /// No API key could be resolved from the secret store
    #[error("API key is required for {provider}")]
    MissingApiKey { provider: String },

    #[error("no endpoint configured for {provider}")]
    MissingEndpoint { provider: String },

    #[error("{provider} API error: {message}")]
    ApiError { provider: String, message: String },

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("model call timed out after {0:?}")]
    Timeout(Duration),

    /// The model answered with nothing usable
    #[error("invalid response from {provider}: {message}")]
    InvalidResponse { provider: String, message: String },

    #[error("{0}")]
    Other(String),
}

impl ProviderError {
    pub fn api_error(provider: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ApiError {
            provider: provider.into(),
            message: message.into(),
        }
    }

    pub fn missing_api_key(provider: impl Into<String>) -> Self {
        Self::MissingApiKey {
            provider: provider.into(),
        }
    }

    pub fn invalid_response(provider: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidResponse {
            provider: provider.into(),
            message: message.into(),
        }
    }
}

pub type ProviderResult<T> = Result<T, ProviderError>;
