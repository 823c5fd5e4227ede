//! Adapter between cloudtriage types and genai types
//!
//! The API key flows through our `SecretStore`, never through genai's own
//! environment lookup.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use genai::chat::{
    ChatMessage as GenaiMessage, MessageContent as GenaiContent, Tool as GenaiTool,
    ToolCall as GenaiToolCall,
};
use genai::resolver::{AuthData, AuthResolver, Endpoint, ServiceTargetResolver};
use genai::{adapter::AdapterKind, Client, ModelIden, ServiceTarget};

use crate::secrets::SecretStore;
use crate::types::{ChatMessage, MessageRole, ToolCall, ToolDescriptor, Transcript};

// ============================================================================
// Messages and tools: cloudtriage -> genai
// ============================================================================

pub fn to_genai_message(msg: &ChatMessage) -> GenaiMessage {
    let content = GenaiContent::from(msg.content.clone());
    match msg.role {
        MessageRole::System => GenaiMessage::system(content),
        MessageRole::User => GenaiMessage::user(content),
        MessageRole::Assistant => GenaiMessage::assistant(content),
    }
}

/// System prompt first, then the transcript in order
pub fn to_genai_messages(system: &str, transcript: &Transcript) -> Vec<GenaiMessage> {
    let mut messages = Vec::with_capacity(transcript.len() + 1);
    if !system.is_empty() {
        messages.push(GenaiMessage::system(GenaiContent::from(system.to_string())));
    }
    messages.extend(transcript.messages().iter().map(to_genai_message));
    messages
}

pub fn to_genai_tool(tool: &ToolDescriptor) -> GenaiTool {
    let mut genai_tool = GenaiTool::new(&tool.name).with_description(&tool.description);
    if let Some(schema) = &tool.input_schema {
        genai_tool = genai_tool.with_schema(schema.clone());
    }
    genai_tool
}

pub fn to_genai_tools(tools: &[ToolDescriptor]) -> Vec<GenaiTool> {
    tools.iter().map(to_genai_tool).collect()
}

// ============================================================================
// Responses: genai -> cloudtriage
// ============================================================================

pub fn from_genai_tool_call(tc: &GenaiToolCall) -> ToolCall {
    ToolCall::new(tc.call_id.clone(), tc.fn_name.clone(), tc.fn_arguments.clone())
}

// ============================================================================
// Client creation
// ============================================================================

/// Base URL of the OpenAI-compatible surface of an Azure OpenAI resource
pub fn azure_base_url(endpoint: &str) -> String {
    let trimmed = endpoint.trim().trim_end_matches('/');
    if trimmed.ends_with("/openai/v1") {
        format!("{}/", trimmed)
    } else {
        format!("{}/openai/v1/", trimmed)
    }
}

/// genai client pinned to one Azure OpenAI endpoint
///
/// Every model name resolves to the OpenAI adapter at `endpoint`; the key
/// is read from `secrets[secret_key]` per request so rotation needs no
/// restart.
pub fn create_client(endpoint: &str, secrets: Arc<dyn SecretStore>, secret_key: &str) -> Client {
    let secret_key = secret_key.to_string();
    let auth_resolver = AuthResolver::from_resolver_async_fn(
        move |_model_iden: ModelIden| -> Pin<Box<dyn Future<Output = genai::resolver::Result<Option<AuthData>>> + Send>> {
            let secrets = secrets.clone();
            let secret_key = secret_key.clone();
            Box::pin(async move { Ok(secrets.get(&secret_key).map(AuthData::from_single)) })
        },
    );

    let base_url = azure_base_url(endpoint);
    let target_resolver = ServiceTargetResolver::from_resolver_fn(
        move |target: ServiceTarget| -> Result<ServiceTarget, genai::resolver::Error> {
            let ServiceTarget { model, auth, .. } = target;
            Ok(ServiceTarget {
                endpoint: Endpoint::from_owned(base_url.clone()),
                auth,
                model: ModelIden::new(AdapterKind::OpenAI, model.model_name.clone()),
            })
        },
    );

    Client::builder()
        .with_auth_resolver(auth_resolver)
        .with_service_target_resolver(target_resolver)
        .build()
}
