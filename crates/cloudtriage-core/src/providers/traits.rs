//! Language-model seam

use async_trait::async_trait;

use super::error::ProviderResult;
use crate::types::{ToolCall, ToolDescriptor, Transcript};

/// What the model did with one request
#[derive(Debug, Clone, PartialEq)]
pub enum ModelTurn {
    /// Plain answer text
    Text(String),
    /// The model picked a tool; only the first call of a turn is kept
    ToolCall(ToolCall),
}

impl ModelTurn {
    pub fn text(&self) -> Option<&str> {
        match self {
            ModelTurn::Text(text) => Some(text),
            ModelTurn::ToolCall(_) => None,
        }
    }
}

/// One completion over a transcript, optionally with tools
///
/// Implementations are stateless per call; the transcript carries history.
#[async_trait]
pub trait ChatModel: Send + Sync {
    fn name(&self) -> &str;

    async fn complete(
        &self,
        system: &str,
        transcript: &Transcript,
        tools: &[ToolDescriptor],
    ) -> ProviderResult<ModelTurn>;
}
