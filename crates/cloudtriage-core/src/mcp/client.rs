//! MCP client using the official rmcp SDK
//!
//! Connects to an MCP server spawned as a child process (stdio) or reached
//! over streamable HTTP, and exposes it as a `ToolCatalog`.

use std::time::Duration;

use async_trait::async_trait;
use rmcp::{
    model::{CallToolRequestParams, CallToolResult, ClientCapabilities, ClientInfo, Implementation, RawContent, Tool},
    service::RunningService,
    transport::{StreamableHttpClientTransport, TokioChildProcess},
    RoleClient, ServiceExt,
};
use serde_json::Value;
use thiserror::Error;

use crate::config::McpSettings;
use crate::error::{TriageError, TriageResult};
use crate::logging::SharedLogger;
use crate::remote::bounded;
use crate::tools::ToolCatalog;
use crate::types::{ToolDescriptor, ToolOutput};
use crate::{log_debug, log_info};

/// MCP client errors
#[derive(Error, Debug)]
pub enum McpError {
    #[error("connection failed: {0}")]
    ConnectionFailed(String),

    #[error("initialization failed: {0}")]
    InitializationFailed(String),

    #[error("tool call failed: {0}")]
    ToolCallFailed(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("protocol error: {0}")]
    Protocol(String),
}

pub type McpResult<T> = Result<T, McpError>;

const SOURCE: &str = "mcp:azure";

fn client_info() -> ClientInfo {
    ClientInfo {
        meta: None,
        protocol_version: Default::default(),
        capabilities: ClientCapabilities::default(),
        client_info: Implementation {
            name: "cloudtriage".to_string(),
            title: Some("cloudtriage".to_string()),
            version: env!("CARGO_PKG_VERSION").to_string(),
            website_url: None,
            icons: None,
        },
    }
}

/// Live connection to one MCP server
pub struct McpClient {
    client: RunningService<RoleClient, ClientInfo>,
    logger: SharedLogger,
}

impl McpClient {
    /// Spawn `command args..` and speak MCP over its stdio
    pub async fn connect_stdio(command: &str, args: &[String], logger: SharedLogger) -> McpResult<Self> {
        log_info!(logger, "[McpClient] spawning {} {}", command, args.join(" "));

        let mut cmd = tokio::process::Command::new(command);
        cmd.args(args);
        let transport = TokioChildProcess::new(cmd).map_err(|e| McpError::ConnectionFailed(e.to_string()))?;

        let client = client_info()
            .serve(transport)
            .await
            .map_err(|e| McpError::InitializationFailed(e.to_string()))?;

        log_info!(logger, "[McpClient] connected and initialized");
        Ok(Self { client, logger })
    }

    /// Connect over streamable HTTP
    pub async fn connect_http(url: &str, logger: SharedLogger) -> McpResult<Self> {
        log_info!(logger, "[McpClient] connecting to {}", url);

        let transport = StreamableHttpClientTransport::from_uri(url.to_string());
        let client = client_info()
            .serve(transport)
            .await
            .map_err(|e| McpError::InitializationFailed(e.to_string()))?;

        log_info!(logger, "[McpClient] connected and initialized");
        Ok(Self { client, logger })
    }

    /// Connect as configured; `url` wins over `command`
    pub async fn connect(settings: &McpSettings, timeout: Duration, logger: SharedLogger) -> TriageResult<Self> {
        let connecting = async {
            let client = match settings.url.as_deref().filter(|u| !u.is_empty()) {
                Some(url) => Self::connect_http(url, logger.clone()).await?,
                None => Self::connect_stdio(&settings.command, &settings.args, logger.clone()).await?,
            };
            Ok::<_, TriageError>(client)
        };
        bounded("connect to MCP server", timeout, connecting).await
    }

    pub async fn list_raw_tools(&self) -> McpResult<Vec<Tool>> {
        let result = self
            .client
            .list_tools(Default::default())
            .await
            .map_err(|e| McpError::Protocol(e.to_string()))?;
        log_info!(self.logger, "[McpClient] listed {} tools", result.tools.len());
        Ok(result.tools)
    }

    pub async fn call_raw_tool(&self, name: &str, arguments: Value) -> McpResult<CallToolResult> {
        log_info!(self.logger, "[McpClient] calling tool: {}", name);
        let params = CallToolRequestParams {
            meta: None,
            name: name.to_owned().into(),
            arguments: arguments.as_object().cloned(),
            task: None,
        };
        self.client
            .call_tool(params)
            .await
            .map_err(|e| McpError::ToolCallFailed(e.to_string()))
    }

    pub fn server_info(&self) -> Option<&Implementation> {
        self.client.peer_info().map(|info| &info.server_info)
    }

    pub async fn close(self) -> McpResult<()> {
        log_info!(self.logger, "[McpClient] closing connection");
        self.client
            .cancel()
            .await
            .map_err(|e| McpError::Protocol(e.to_string()))?;
        Ok(())
    }
}

/// rmcp tool to our descriptor
pub fn to_descriptor(tool: &Tool) -> ToolDescriptor {
    ToolDescriptor::new(tool.name.to_string(), tool.description.as_deref().unwrap_or_default())
        .with_schema(Value::Object(tool.input_schema.as_ref().clone()))
        .with_source(SOURCE)
}

/// Text parts of a tool result, newline-joined
pub fn to_output(result: &CallToolResult) -> ToolOutput {
    let text = result
        .content
        .iter()
        .filter_map(|c| match &c.raw {
            RawContent::Text(t) => Some(t.text.clone()),
            _ => None,
        })
        .collect::<Vec<_>>()
        .join("\n");
    if result.is_error.unwrap_or(false) {
        ToolOutput::error(text)
    } else {
        ToolOutput::success(text)
    }
}

#[async_trait]
impl ToolCatalog for McpClient {
    fn source(&self) -> &str {
        SOURCE
    }

    async fn list_tools(&self) -> TriageResult<Vec<ToolDescriptor>> {
        let tools = self.list_raw_tools().await?;
        Ok(tools.iter().map(to_descriptor).collect())
    }

    async fn call_tool(&self, name: &str, arguments: Value) -> TriageResult<ToolOutput> {
        let result = self.call_raw_tool(name, arguments).await?;
        let output = to_output(&result);
        log_debug!(
            self.logger,
            "[McpClient] {} returned {} chars (error: {})",
            name,
            output.content.len(),
            output.is_error
        );
        Ok(output)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rmcp::model::Content;
    use std::sync::Arc;

    #[test]
    fn test_descriptor_conversion() {
        let mut schema = serde_json::Map::new();
        schema.insert("type".to_string(), Value::String("object".to_string()));
        let tool = Tool::new("azmcp-storage-blob-list", "List blobs", Arc::new(schema));

        let descriptor = to_descriptor(&tool);
        assert_eq!(descriptor.name, "azmcp-storage-blob-list");
        assert_eq!(descriptor.description, "List blobs");
        assert_eq!(descriptor.source, "mcp:azure");
        assert_eq!(descriptor.input_schema, Some(serde_json::json!({"type": "object"})));
    }

    #[test]
    fn test_output_conversion() {
        let ok = CallToolResult::success(vec![Content::text("first"), Content::text("second")]);
        assert_eq!(to_output(&ok), ToolOutput::success("first\nsecond"));

        let failed = CallToolResult::error(vec![Content::text("denied")]);
        assert_eq!(to_output(&failed), ToolOutput::error("denied"));
    }
}
