//! Crate-level error type

use std::time::Duration;

use thiserror::Error;

use crate::auth::AuthError;
use crate::config::ConfigError;
use crate::context::ContextField;
use crate::handlers::HandlerKind;
use crate::mcp::McpError;
use crate::providers::ProviderError;
use crate::secrets::SecretStoreError;

/// Every failure the orchestration core can surface
///
/// A tripped guardrail is not an error; the router reports it as
/// `RouteOutcome::Halted`.
#[derive(Error, Debug)]
pub enum TriageError {
    /// Credential acquisition failed; not retried
    #[error("authentication failed: {0}")]
    AuthFailure(#[from] AuthError),

    /// The context lacks a field the handler kind requires
    #[error("{kind} handler requires {field}")]
    MissingParameter {
        kind: HandlerKind,
        field: ContextField,
    },

    #[error("unknown handler kind '{0}'")]
    UnknownHandlerKind(String),

    /// A remote call exceeded its bound; retried once before surfacing
    #[error("{operation} timed out after {elapsed:?}")]
    RemoteTimeout {
        operation: String,
        elapsed: Duration,
    },

    /// A remote call failed; `detail` names the handler kind and the
    /// (redacted) context it was built from
    #[error("{operation} failed [{detail}]: {message}")]
    Remote {
        operation: String,
        detail: String,
        message: String,
    },

    #[error("model error: {0}")]
    Model(#[from] ProviderError),

    #[error("tool error: {0}")]
    Tool(String),

    #[error("MCP error: {0}")]
    Mcp(#[from] McpError),

    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("secret store error: {0}")]
    Secrets(#[from] SecretStoreError),

    #[error("request cancelled")]
    Cancelled,

    #[error("no specialist registered for '{0}'")]
    UnknownSpecialist(String),
}

impl TriageError {
    pub fn remote(
        operation: impl Into<String>,
        detail: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self::Remote {
            operation: operation.into(),
            detail: detail.into(),
            message: message.into(),
        }
    }

    /// Only timeouts are worth a second attempt
    pub fn is_retryable(&self) -> bool {
        matches!(self, TriageError::RemoteTimeout { .. })
    }

    /// Plain-text rendering for the operator
    ///
    /// Never includes cache keys, tokens or the redaction detail. Credential
    /// failures carry the provider's own reason.
    pub fn user_message(&self) -> String {
        match self {
            TriageError::AuthFailure(e) => format!(
                "I couldn't authenticate with Azure: {}. Sign in again (for example with `az login`) and retry.",
                e
            ),
            TriageError::MissingParameter { kind, field } => format!(
                "I need the {} before I can work with {}. Please provide it.",
                field.label(),
                kind.label()
            ),
            TriageError::UnknownHandlerKind(name) => {
                format!("'{}' is not a resource type I can work with.", name)
            }
            TriageError::RemoteTimeout { operation, .. } => {
                format!("{} took too long to respond. Please try again.", operation)
            }
            TriageError::Remote { operation, message, .. } => {
                format!("{} failed: {}", operation, message)
            }
            TriageError::Model(_) => {
                "The language model could not process this request. Please try again.".to_string()
            }
            TriageError::Tool(message) => format!("A tool call failed: {}", message),
            TriageError::Mcp(_) => "The MCP tool server is unavailable.".to_string(),
            TriageError::Config(e) => format!("The configuration is invalid: {}", e),
            TriageError::Secrets(_) => "A required secret could not be read.".to_string(),
            TriageError::Cancelled => "The request was cancelled.".to_string(),
            TriageError::UnknownSpecialist(name) => {
                format!("No specialist is available for '{}'.", name)
            }
        }
    }
}

pub type TriageResult<T> = Result<T, TriageError>;
