//! GenaiModel - Azure OpenAI chat through the genai crate

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures::StreamExt;
use genai::chat::{ChatOptions, ChatRequest, ChatStreamEvent};
use genai::Client;

use super::error::{ProviderError, ProviderResult};
use super::genai_adapter::{create_client, from_genai_tool_call, to_genai_messages, to_genai_tools};
use super::traits::{ChatModel, ModelTurn};
use crate::config::{ModelSettings, TimeoutSettings};
use crate::logging::{NoOpLogger, SharedLogger};
use crate::secrets::SecretStore;
use crate::types::{ToolDescriptor, Transcript};
use crate::{log_debug, log_error, log_info};

const PROVIDER: &str = "azure-openai";

/// Chat model backed by one Azure OpenAI deployment
pub struct GenaiModel {
    client: Client,
    deployment: String,
    secrets: Arc<dyn SecretStore>,
    api_key_secret: String,
    timeout: Duration,
    logger: SharedLogger,
}

impl GenaiModel {
    pub fn from_settings(
        settings: &ModelSettings,
        timeouts: &TimeoutSettings,
        secrets: Arc<dyn SecretStore>,
    ) -> ProviderResult<Self> {
        let endpoint = settings
            .endpoint
            .as_deref()
            .filter(|e| !e.trim().is_empty())
            .ok_or_else(|| ProviderError::MissingEndpoint {
                provider: PROVIDER.to_string(),
            })?;
        Ok(Self {
            client: create_client(endpoint, secrets.clone(), &settings.api_key_secret),
            deployment: settings.deployment.clone(),
            secrets,
            api_key_secret: settings.api_key_secret.clone(),
            timeout: timeouts.model(),
            logger: Arc::new(NoOpLogger::new()),
        })
    }

    pub fn with_logger(mut self, logger: SharedLogger) -> Self {
        self.logger = logger;
        self
    }

    pub fn deployment(&self) -> &str {
        &self.deployment
    }

    async fn exchange(&self, request: ChatRequest) -> ProviderResult<ModelTurn> {
        let options = ChatOptions::default().with_capture_tool_calls(true);
        let response = self
            .client
            .exec_chat_stream(&self.deployment, request, Some(&options))
            .await
            .map_err(|e| ProviderError::api_error(PROVIDER, e.to_string()))?;

        let mut stream = Box::pin(response.stream);
        let mut text = String::new();
        let mut tool_call = None;
        while let Some(event) = stream.next().await {
            let event = event.map_err(|e| {
                log_error!(self.logger, "[GenaiModel] stream error: {}", e);
                ProviderError::api_error(PROVIDER, e.to_string())
            })?;
            match event {
                ChatStreamEvent::Chunk(chunk) => text.push_str(&chunk.content),
                ChatStreamEvent::End(end) => {
                    if let Some(calls) = end.captured_tool_calls() {
                        if calls.len() > 1 {
                            log_debug!(self.logger, "[GenaiModel] {} tool calls, keeping the first", calls.len());
                        }
                        tool_call = calls.first().map(|tc| from_genai_tool_call(tc));
                    }
                }
                _ => {}
            }
        }

        match tool_call {
            Some(call) => {
                log_info!(self.logger, "[GenaiModel] tool call: {}", call.name);
                Ok(ModelTurn::ToolCall(call))
            }
            None if text.trim().is_empty() => {
                Err(ProviderError::invalid_response(PROVIDER, "empty completion"))
            }
            None => Ok(ModelTurn::Text(text)),
        }
    }
}

#[async_trait]
impl ChatModel for GenaiModel {
    fn name(&self) -> &str {
        PROVIDER
    }

    async fn complete(
        &self,
        system: &str,
        transcript: &Transcript,
        tools: &[ToolDescriptor],
    ) -> ProviderResult<ModelTurn> {
        if !self.secrets.has(&self.api_key_secret) {
            return Err(ProviderError::missing_api_key(PROVIDER));
        }

        let mut request = ChatRequest::new(to_genai_messages(system, transcript));
        if !tools.is_empty() {
            request = request.with_tools(to_genai_tools(tools));
        }
        log_debug!(
            self.logger,
            "[GenaiModel] completing with {} messages, {} tools",
            transcript.len(),
            tools.len()
        );

        tokio::time::timeout(self.timeout, self.exchange(request))
            .await
            .map_err(|_| ProviderError::Timeout(self.timeout))?
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::secrets::MemorySecretStore;

    fn settings(endpoint: Option<&str>) -> ModelSettings {
        ModelSettings {
            endpoint: endpoint.map(str::to_string),
            ..ModelSettings::default()
        }
    }

    #[test]
    fn test_endpoint_is_required() {
        let secrets: Arc<dyn SecretStore> = Arc::new(MemorySecretStore::new());
        let err = GenaiModel::from_settings(&settings(None), &TimeoutSettings::default(), secrets.clone())
            .err()
            .unwrap();
        assert!(matches!(err, ProviderError::MissingEndpoint { .. }));
        assert!(GenaiModel::from_settings(&settings(Some(" ")), &TimeoutSettings::default(), secrets).is_err());
    }

    #[tokio::test]
    async fn test_missing_key_fails_before_any_request() {
        let secrets: Arc<dyn SecretStore> = Arc::new(MemorySecretStore::new());
        let model = GenaiModel::from_settings(
            &settings(Some("https://contoso.openai.azure.com")),
            &TimeoutSettings::default(),
            secrets,
        )
        .unwrap();
        assert_eq!(model.deployment(), "gpt-4o-mini");
        let err = model
            .complete("system", &Transcript::from_request("hi"), &[])
            .await
            .err()
            .unwrap();
        assert!(matches!(err, ProviderError::MissingApiKey { .. }));
    }
}
