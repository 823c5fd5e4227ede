//! Specialists and their registry

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use super::kind::SpecialistKind;
use crate::context::ContextStore;
use crate::error::{TriageError, TriageResult};
use crate::handlers::{HandlerFactory, HandlerKind, ResourceHandle};
use crate::logging::{NoOpLogger, SharedLogger};
use crate::providers::{ChatModel, ModelTurn};
use crate::tools::SpecialistToolset;
use crate::types::{ToolCall, ToolDescriptor, Transcript};
use crate::{log_debug, log_info};

/// Longest JSON payload echoed back to the operator
const MAX_RESULT_CHARS: usize = 2000;

/// A handler of requests scoped to one resource domain
///
/// Receives the router's own context, so fields the gate confirmed are
/// already there.
#[async_trait]
pub trait Specialist: Send + Sync {
    fn kind(&self) -> SpecialistKind;

    async fn handle(&self, transcript: &Transcript, context: &Arc<ContextStore>) -> TriageResult<String>;
}

/// Specialists keyed by kind, fixed once the router is built
#[derive(Default, Clone)]
pub struct SpecialistRegistry {
    specialists: BTreeMap<SpecialistKind, Arc<dyn Specialist>>,
}

impl SpecialistRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add `specialist`, replacing any earlier one of the same kind
    pub fn register(mut self, specialist: Arc<dyn Specialist>) -> Self {
        self.specialists.insert(specialist.kind(), specialist);
        self
    }

    pub fn get(&self, kind: SpecialistKind) -> TriageResult<Arc<dyn Specialist>> {
        self.specialists
            .get(&kind)
            .cloned()
            .ok_or_else(|| TriageError::UnknownSpecialist(kind.to_string()))
    }

    pub fn kinds(&self) -> Vec<SpecialistKind> {
        self.specialists.keys().copied().collect()
    }

    pub fn len(&self) -> usize {
        self.specialists.len()
    }

    pub fn is_empty(&self) -> bool {
        self.specialists.is_empty()
    }
}

/// Asks a chat model which operation to run for a specialist
pub struct ModelOperationPlanner {
    model: Arc<dyn ChatModel>,
}

impl ModelOperationPlanner {
    pub fn new(model: Arc<dyn ChatModel>) -> Self {
        Self { model }
    }

    pub async fn plan(
        &self,
        brief: &str,
        transcript: &Transcript,
        tools: &[ToolDescriptor],
    ) -> TriageResult<ModelTurn> {
        Ok(self.model.complete(brief, transcript, tools).await?)
    }
}

fn brief(kind: SpecialistKind, context: &ContextStore) -> String {
    let snapshot = context.snapshot();
    let known = if snapshot.is_empty() {
        "none".to_string()
    } else {
        snapshot.redacted()
    };
    format!(
        "You are the specialist for {}. Pick the one tool that fulfils the operator's latest request, \
         or answer directly if no tool is needed. Known context: {}",
        kind.description(),
        known
    )
}

/// Tool name for an operation on a handler kind, e.g. `list_key_vault`
pub fn operation_tool_name(operation: &str, kind: HandlerKind) -> String {
    format!("{}_{}", operation, kind.as_str())
}

/// Inverse of `operation_tool_name`
pub fn parse_operation_tool(name: &str) -> Option<(String, HandlerKind)> {
    let (operation, kind) = name.split_once('_')?;
    let kind = kind.parse().ok()?;
    Some((operation.to_string(), kind))
}

/// Specialist that runs handler operations chosen by the model
pub struct ResourceSpecialist {
    kind: SpecialistKind,
    factory: Arc<HandlerFactory>,
    planner: ModelOperationPlanner,
    logger: SharedLogger,
}

impl ResourceSpecialist {
    pub fn new(kind: SpecialistKind, factory: Arc<HandlerFactory>, model: Arc<dyn ChatModel>) -> Self {
        Self {
            kind,
            factory,
            planner: ModelOperationPlanner::new(model),
            logger: Arc::new(NoOpLogger::new()),
        }
    }

    pub fn with_logger(mut self, logger: SharedLogger) -> Self {
        self.logger = logger;
        self
    }

    async fn handles(&self, context: &ContextStore) -> TriageResult<Vec<Arc<dyn ResourceHandle>>> {
        let mut handles = Vec::new();
        for kind in self.kind.handler_kinds() {
            handles.push(self.factory.get_handler(*kind, context).await?);
        }
        Ok(handles)
    }

    async fn run(&self, call: &ToolCall, handles: &[Arc<dyn ResourceHandle>]) -> TriageResult<String> {
        let (operation, kind) = parse_operation_tool(&call.name)
            .ok_or_else(|| TriageError::Tool(format!("unknown operation '{}'", call.name)))?;
        let handle = handles
            .iter()
            .find(|h| h.kind() == kind)
            .ok_or_else(|| TriageError::Tool(format!("'{}' is not available here", call.name)))?;
        log_info!(self.logger, "[ResourceSpecialist] {} runs {}", self.kind, call.name);
        let result = handle.invoke(&operation, call.input.clone()).await?;
        Ok(format_result(&operation, kind, &result))
    }
}

#[async_trait]
impl Specialist for ResourceSpecialist {
    fn kind(&self) -> SpecialistKind {
        self.kind
    }

    async fn handle(&self, transcript: &Transcript, context: &Arc<ContextStore>) -> TriageResult<String> {
        let handles = self.handles(context).await?;
        let tools: Vec<ToolDescriptor> = handles
            .iter()
            .flat_map(|handle| {
                let kind = handle.kind();
                handle.operations().into_iter().map(move |op| {
                    ToolDescriptor::new(operation_tool_name(&op.name, kind), op.description)
                        .with_schema(op.input_schema)
                        .with_source("arm")
                })
            })
            .collect();
        log_debug!(self.logger, "[ResourceSpecialist] {} offers {} operations", self.kind, tools.len());

        match self.planner.plan(&brief(self.kind, context), transcript, &tools).await? {
            ModelTurn::Text(text) => Ok(text),
            ModelTurn::ToolCall(call) => self.run(&call, &handles).await,
        }
    }
}

/// Generic specialist over a filtered MCP tool set
pub struct McpSpecialist {
    toolset: SpecialistToolset,
    planner: ModelOperationPlanner,
    logger: SharedLogger,
}

impl McpSpecialist {
    pub fn new(toolset: SpecialistToolset, model: Arc<dyn ChatModel>) -> Self {
        Self {
            toolset,
            planner: ModelOperationPlanner::new(model),
            logger: Arc::new(NoOpLogger::new()),
        }
    }

    pub fn with_logger(mut self, logger: SharedLogger) -> Self {
        self.logger = logger;
        self
    }

    pub fn toolset(&self) -> &SpecialistToolset {
        &self.toolset
    }
}

#[async_trait]
impl Specialist for McpSpecialist {
    fn kind(&self) -> SpecialistKind {
        SpecialistKind::AzureMcp
    }

    async fn handle(&self, transcript: &Transcript, context: &Arc<ContextStore>) -> TriageResult<String> {
        let turn = self
            .planner
            .plan(&brief(SpecialistKind::AzureMcp, context), transcript, self.toolset.tools())
            .await?;
        match turn {
            ModelTurn::Text(text) => Ok(text),
            ModelTurn::ToolCall(call) => {
                log_info!(self.logger, "[McpSpecialist] calling {}", call.name);
                let output = self.toolset.call(&call).await?;
                if output.is_error {
                    return Err(TriageError::Tool(output.content));
                }
                Ok(output.content)
            }
        }
    }
}

/// Operator-facing text for an operation result
pub fn format_result(operation: &str, kind: HandlerKind, result: &Value) -> String {
    if operation == "list" {
        let names: Vec<&str> = result
            .get("value")
            .and_then(|v| v.as_array())
            .map(|items| {
                items
                    .iter()
                    .filter_map(|item| item.get("name").and_then(|n| n.as_str()))
                    .collect()
            })
            .unwrap_or_default();
        return if names.is_empty() {
            format!("No {} found.", kind.label())
        } else {
            format!("Found {} {}: {}", names.len(), kind.label(), names.join(", "))
        };
    }

    let mut body = serde_json::to_string_pretty(result).unwrap_or_else(|_| result.to_string());
    if body.chars().count() > MAX_RESULT_CHARS {
        body = body.chars().take(MAX_RESULT_CHARS).collect();
        body.push_str("\n...");
    }
    format!("{} on {} succeeded:\n{}", operation, kind.label(), body)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::{StaticCredential, TokenCache};
    use crate::context::ContextField;
    use crate::handlers::CannedHandlerBuilder;
    use crate::providers::MockModel;
    use crate::tools::{StaticToolCatalog, ToolFilter};
    use serde_json::json;
    use std::time::Duration;

    fn context() -> Arc<ContextStore> {
        let ctx = ContextStore::with_auth(Arc::new(TokenCache::new(
            Arc::new(StaticCredential::new("tok", Duration::from_secs(3600))),
            "scope",
        )));
        ctx.set_if_absent(ContextField::AccountId, "sub-00001111");
        ctx.set_if_absent(ContextField::GroupName, "rg-data");
        ctx.set_if_absent(ContextField::ResourceName, "kv-main");
        Arc::new(ctx)
    }

    #[test]
    fn test_operation_tool_names() {
        assert_eq!(operation_tool_name("list", HandlerKind::KeyVault), "list_key_vault");
        assert_eq!(
            parse_operation_tool("update_adf_linked_services"),
            Some(("update".to_string(), HandlerKind::AdfLinkedServices))
        );
        assert_eq!(parse_operation_tool("list_unknown"), None);
        assert_eq!(parse_operation_tool("list"), None);
    }

    #[test]
    fn test_format_result() {
        let listing = json!({"value": [{"name": "db-password"}, {"name": "api-key"}]});
        assert_eq!(
            format_result("list", HandlerKind::KeyVault, &listing),
            "Found 2 key vault secrets: db-password, api-key"
        );
        assert_eq!(
            format_result("list", HandlerKind::Locks, &json!({"value": []})),
            "No resource locks found."
        );
        let got = format_result("get", HandlerKind::KeyVault, &json!({"name": "db-password"}));
        assert!(got.starts_with("get on key vault secrets succeeded:"));
    }

    #[test]
    fn test_registry_lookup() {
        let factory = Arc::new(HandlerFactory::new(Arc::new(CannedHandlerBuilder::new())));
        let registry = SpecialistRegistry::new().register(Arc::new(ResourceSpecialist::new(
            SpecialistKind::KeyVault,
            factory,
            Arc::new(MockModel::new()),
        )));
        assert_eq!(registry.kinds(), vec![SpecialistKind::KeyVault]);
        assert!(registry.get(SpecialistKind::KeyVault).is_ok());
        assert!(matches!(
            registry.get(SpecialistKind::Locks),
            Err(TriageError::UnknownSpecialist(_))
        ));
    }

    #[tokio::test]
    async fn test_resource_specialist_runs_chosen_operation() {
        let builder = Arc::new(
            CannedHandlerBuilder::new().with_names(HandlerKind::KeyVault, &["db-password", "api-key"]),
        );
        let factory = Arc::new(HandlerFactory::new(builder.clone()));
        let model = Arc::new(MockModel::new().then_tool("list_key_vault", json!({})));
        let specialist = ResourceSpecialist::new(SpecialistKind::KeyVault, factory, model.clone());

        let reply = specialist
            .handle(&Transcript::from_request("list the secrets"), &context())
            .await
            .unwrap();
        assert_eq!(reply, "Found 2 key vault secrets: db-password, api-key");

        let offered = &model.requests()[0].tool_names;
        assert_eq!(offered, &vec!["list_key_vault", "get_key_vault", "update_key_vault"]);
        assert!(model.requests()[0].system.contains("resource_name=kv-main"));
        assert!(!model.requests()[0].system.contains("sub-00001111"));
    }

    #[tokio::test]
    async fn test_resource_specialist_needs_context() {
        let factory = Arc::new(HandlerFactory::new(Arc::new(CannedHandlerBuilder::new())));
        let model = Arc::new(MockModel::new());
        let specialist = ResourceSpecialist::new(SpecialistKind::BatchPool, factory, model.clone());
        let err = specialist
            .handle(&Transcript::from_request("resize the pool"), &context())
            .await
            .err()
            .unwrap();
        assert!(matches!(err, TriageError::MissingParameter { field: ContextField::PoolName, .. }));
        assert!(model.requests().is_empty());
    }

    #[tokio::test]
    async fn test_mcp_specialist_uses_filtered_tools() {
        let catalog = Arc::new(StaticToolCatalog::named(&["storage", "keyvault", "azmcp-storage-blob-list"]));
        let filter = ToolFilter::from_settings(&crate::config::McpSettings::default());
        let toolset = SpecialistToolset::connect(catalog.clone(), &filter).await.unwrap();
        let model = Arc::new(
            MockModel::new()
                .then_tool("azmcp-storage-blob-list", json!({"account": "st1"}))
                .then_tool("keyvault", json!({})),
        );
        let specialist = McpSpecialist::new(toolset, model.clone());
        let transcript = Transcript::from_request("list blobs in st1");

        let reply = specialist.handle(&transcript, &context()).await.unwrap();
        assert!(reply.starts_with("azmcp-storage-blob-list ran"));
        assert_eq!(model.requests()[0].tool_names, vec!["storage", "azmcp-storage-blob-list"]);

        // a tool outside the frozen set never reaches the catalog
        assert!(specialist.handle(&transcript, &context()).await.is_err());
        assert_eq!(catalog.calls().len(), 1);
        assert_eq!(catalog.list_count(), 1);
    }
}
