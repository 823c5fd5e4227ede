//! Tool descriptors and tool calls

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A remotely discovered (or locally declared) operation a model may call
///
/// Read-only to the orchestration core: the tool filter inspects it, the
/// model sees it, nothing mutates it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolDescriptor {
    /// Tool name (function name)
    pub name: String,
    /// Description of what the tool does
    #[serde(default)]
    pub description: String,
    /// JSON Schema for the input parameters
    #[serde(rename = "inputSchema", skip_serializing_if = "Option::is_none")]
    pub input_schema: Option<Value>,
    /// Where the descriptor came from (e.g. "mcp:azure", "local")
    #[serde(default)]
    pub source: String,
}

impl ToolDescriptor {
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            input_schema: None,
            source: "local".to_string(),
        }
    }

    pub fn with_schema(mut self, schema: Value) -> Self {
        self.input_schema = Some(schema);
        self
    }

    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = source.into();
        self
    }
}

/// Tool call chosen by the model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCall {
    pub id: String,
    pub name: String,
    pub input: Value,
}

impl ToolCall {
    pub fn new(id: impl Into<String>, name: impl Into<String>, input: Value) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            input,
        }
    }

    /// Get an input argument as a string
    pub fn get_arg_str(&self, key: &str) -> Option<&str> {
        self.input.get(key).and_then(|v| v.as_str())
    }

    /// Get an input argument as a bool
    pub fn get_arg_bool(&self, key: &str) -> Option<bool> {
        self.input.get(key).and_then(|v| v.as_bool())
    }
}

/// Text result of executing a tool
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolOutput {
    pub content: String,
    #[serde(rename = "isError", default, skip_serializing_if = "std::ops::Not::not")]
    pub is_error: bool,
}

impl ToolOutput {
    pub fn success(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            is_error: false,
        }
    }

    pub fn error(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            is_error: true,
        }
    }
}
