//! Scripted model for testing
//!
//! Replays queued turns in order without network access and records every
//! request it receives, so routing decisions are deterministic in tests.

use std::collections::VecDeque;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::Value;

use super::error::{ProviderError, ProviderResult};
use super::traits::{ChatModel, ModelTurn};
use crate::logging::{NoOpLogger, SharedLogger};
use crate::types::{ToolCall, ToolDescriptor, Transcript};
use crate::log_debug;

/// One queued reply
#[derive(Debug, Clone)]
pub enum MockReply {
    Turn(ModelTurn),
    Error(String),
}

/// What the model was asked
#[derive(Debug, Clone)]
pub struct MockRequest {
    pub system: String,
    pub latest_request: Option<String>,
    pub tool_names: Vec<String>,
}

/// Chat model that replays a script
pub struct MockModel {
    script: Mutex<VecDeque<MockReply>>,
    /// Used once the script runs out
    fallback: Option<String>,
    requests: Mutex<Vec<MockRequest>>,
    logger: SharedLogger,
}

impl Default for MockModel {
    fn default() -> Self {
        Self::new()
    }
}

impl MockModel {
    pub fn new() -> Self {
        Self {
            script: Mutex::new(VecDeque::new()),
            fallback: None,
            requests: Mutex::new(Vec::new()),
            logger: Arc::new(NoOpLogger::new()),
        }
    }

    /// Model that always answers `text`
    pub fn fixed(text: impl Into<String>) -> Self {
        Self {
            fallback: Some(text.into()),
            ..Self::new()
        }
    }

    pub fn then_text(self, text: impl Into<String>) -> Self {
        self.script.lock().push_back(MockReply::Turn(ModelTurn::Text(text.into())));
        self
    }

    pub fn then_tool(self, name: impl Into<String>, input: Value) -> Self {
        let id = format!("call_{}", self.script.lock().len() + 1);
        let call = ToolCall::new(id, name, input);
        self.script.lock().push_back(MockReply::Turn(ModelTurn::ToolCall(call)));
        self
    }

    pub fn then_error(self, message: impl Into<String>) -> Self {
        self.script.lock().push_back(MockReply::Error(message.into()));
        self
    }

    pub fn with_logger(mut self, logger: SharedLogger) -> Self {
        self.logger = logger;
        self
    }

    pub fn requests(&self) -> Vec<MockRequest> {
        self.requests.lock().clone()
    }

    pub fn remaining(&self) -> usize {
        self.script.lock().len()
    }
}

#[async_trait]
impl ChatModel for MockModel {
    fn name(&self) -> &str {
        "mock"
    }

    async fn complete(
        &self,
        system: &str,
        transcript: &Transcript,
        tools: &[ToolDescriptor],
    ) -> ProviderResult<ModelTurn> {
        self.requests.lock().push(MockRequest {
            system: system.to_string(),
            latest_request: transcript.latest_request().map(str::to_string),
            tool_names: tools.iter().map(|t| t.name.clone()).collect(),
        });

        let next = self.script.lock().pop_front();
        log_debug!(self.logger, "[MockModel] replying with {:?}", next);
        match next {
            Some(MockReply::Turn(turn)) => Ok(turn),
            Some(MockReply::Error(message)) => Err(ProviderError::api_error("mock", message)),
            None => self
                .fallback
                .clone()
                .map(ModelTurn::Text)
                .ok_or_else(|| ProviderError::Other("mock script exhausted".to_string())),
        }
    }
}
