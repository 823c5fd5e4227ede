//! Remote tool catalogs and the frozen per-specialist tool set

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::Value;

use super::filter::ToolFilter;
use crate::config::TimeoutSettings;
use crate::error::{TriageError, TriageResult};
use crate::logging::{NoOpLogger, SharedLogger};
use crate::remote::bounded;
use crate::types::{ToolCall, ToolDescriptor, ToolOutput};
use crate::{log_info, log_warn};

/// A source of remotely executed tools
#[async_trait]
pub trait ToolCatalog: Send + Sync {
    /// Label stamped on descriptors, e.g. `mcp:azure`
    fn source(&self) -> &str;

    async fn list_tools(&self) -> TriageResult<Vec<ToolDescriptor>>;

    async fn call_tool(&self, name: &str, arguments: Value) -> TriageResult<ToolOutput>;
}

/// The filtered tools one specialist may use
///
/// Fetched once at connect time and fixed for the lifetime of the
/// connection; calls naming any other tool are refused without reaching
/// the catalog.
#[derive(Clone)]
pub struct SpecialistToolset {
    catalog: Arc<dyn ToolCatalog>,
    tools: Arc<[ToolDescriptor]>,
    logger: SharedLogger,
}

impl SpecialistToolset {
    pub async fn connect(catalog: Arc<dyn ToolCatalog>, filter: &ToolFilter) -> TriageResult<Self> {
        Self::connect_with(
            catalog,
            filter,
            TimeoutSettings::default().tool_catalog(),
            Arc::new(NoOpLogger::new()),
        )
        .await
    }

    pub async fn connect_with(
        catalog: Arc<dyn ToolCatalog>,
        filter: &ToolFilter,
        timeout: Duration,
        logger: SharedLogger,
    ) -> TriageResult<Self> {
        let operation = format!("list tools from {}", catalog.source());
        let listed = bounded(&operation, timeout, catalog.list_tools()).await?;
        let total = listed.len();
        let tools: Arc<[ToolDescriptor]> = filter.apply(listed).into();
        log_info!(
            logger,
            "[SpecialistToolset] {} of {} tools from {} allowed",
            tools.len(),
            total,
            catalog.source()
        );
        Ok(Self { catalog, tools, logger })
    }

    pub fn tools(&self) -> &[ToolDescriptor] {
        &self.tools
    }

    pub fn shared_tools(&self) -> Arc<[ToolDescriptor]> {
        self.tools.clone()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.tools.iter().any(|t| t.name == name)
    }

    pub async fn call(&self, call: &ToolCall) -> TriageResult<ToolOutput> {
        if !self.contains(&call.name) {
            log_warn!(self.logger, "[SpecialistToolset] refused tool outside the set: {}", call.name);
            return Err(TriageError::Tool(format!("tool '{}' is not available here", call.name)));
        }
        self.catalog.call_tool(&call.name, call.input.clone()).await
    }
}

impl std::fmt::Debug for SpecialistToolset {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SpecialistToolset")
            .field("source", &self.catalog.source())
            .field("tools", &self.tools.len())
            .finish()
    }
}

/// In-memory catalog for testing
pub struct StaticToolCatalog {
    tools: Vec<ToolDescriptor>,
    lists: AtomicUsize,
    calls: Mutex<Vec<(String, Value)>>,
}

impl StaticToolCatalog {
    pub fn new(tools: Vec<ToolDescriptor>) -> Self {
        Self {
            tools,
            lists: AtomicUsize::new(0),
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Catalog of bare tools named `names`
    pub fn named(names: &[&str]) -> Self {
        Self::new(names.iter().map(|n| ToolDescriptor::new(*n, format!("{} tool", n))).collect())
    }

    pub fn list_count(&self) -> usize {
        self.lists.load(Ordering::SeqCst)
    }

    pub fn calls(&self) -> Vec<(String, Value)> {
        self.calls.lock().clone()
    }
}

#[async_trait]
impl ToolCatalog for StaticToolCatalog {
    fn source(&self) -> &str {
        "static"
    }

    async fn list_tools(&self) -> TriageResult<Vec<ToolDescriptor>> {
        self.lists.fetch_add(1, Ordering::SeqCst);
        Ok(self.tools.clone())
    }

    async fn call_tool(&self, name: &str, arguments: Value) -> TriageResult<ToolOutput> {
        self.calls.lock().push((name.to_string(), arguments.clone()));
        Ok(ToolOutput::success(format!("{} ran with {}", name, arguments)))
    }
}
