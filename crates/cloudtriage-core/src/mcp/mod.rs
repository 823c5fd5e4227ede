//! MCP (Model Context Protocol) client module
//!
//! Uses the official rmcp SDK. The generic specialist reaches the Azure MCP
//! server through `McpClient`, which implements `tools::ToolCatalog`.
//!
//! # Example
//!
//! ```rust,ignore
//! use cloudtriage_core::mcp::McpClient;
//! use cloudtriage_core::tools::{SpecialistToolset, ToolFilter};
//!
//! let client = Arc::new(McpClient::connect(&settings.mcp, timeout, logger).await?);
//! let toolset = SpecialistToolset::connect(client, &ToolFilter::from_settings(&settings.mcp)).await?;
//! ```

mod client;

pub use client::{to_descriptor, to_output, McpClient, McpError, McpResult};
