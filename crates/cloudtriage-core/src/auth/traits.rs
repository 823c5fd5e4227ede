//! Credential provider trait and errors

use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

use super::token::AccessToken;

/// Source of fresh access tokens
///
/// Implementations:
/// - `StaticCredential`: fixed token (tests, pre-issued tokens)
/// - `ClientSecretCredential`: OAuth2 client-credentials grant
/// - `CliCredential`: `az account get-access-token`
/// - `ChainedCredential`: first success among several providers
#[async_trait]
pub trait CredentialProvider: Send + Sync {
    fn name(&self) -> &str;

    /// Acquire a new token for `scope`
    async fn acquire(&self, scope: &str) -> AuthResult<AccessToken>;
}

#[derive(Error, Debug)]
pub enum AuthError {
    /// The provider cannot run here (missing secret, CLI not installed)
    #[error("credential unavailable: {0}")]
    Unavailable(String),

    #[error("token request rejected ({status}): {message}")]
    Rejected { status: u16, message: String },

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("invalid token response: {0}")]
    InvalidResponse(String),

    #[error("Azure CLI failed: {0}")]
    Cli(String),

    #[error("credential acquisition timed out after {0:?}")]
    Timeout(Duration),

    #[error("no credential succeeded: {}", .0.join("; "))]
    Exhausted(Vec<String>),
}

pub type AuthResult<T> = Result<T, AuthError>;
