//! Azure Resource Manager pass-through handles
//!
//! Every kind maps to one ARM collection. The handle exposes `list`, `get`
//! and (for child resources) `update` against that collection and returns
//! the JSON ARM sends back. A fresh bearer token is taken from the context's
//! `TokenCache` per request, and every request is bounded by the
//! configured request timeout.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Method, Url};
use serde_json::{json, Value};

use super::handle::{HandlerBuilder, OperationSpec, ResourceHandle};
use super::kind::HandlerKind;
use super::params::HandlerParams;
use crate::auth::TokenCache;
use crate::config::TimeoutSettings;
use crate::context::ContextField;
use crate::error::{TriageError, TriageResult};
use crate::logging::{NoOpLogger, SharedLogger};
use crate::remote::bounded;
use crate::log_debug;

/// Public-cloud management endpoint
pub const ARM_ENDPOINT: &str = "https://management.azure.com";

/// `nextLink` pages followed by one `list` call
const MAX_PAGES: usize = 20;

fn api_version(kind: HandlerKind) -> &'static str {
    match kind {
        HandlerKind::Subscriptions => "2022-12-01",
        HandlerKind::ResourceGroups | HandlerKind::Resources => "2021-04-01",
        HandlerKind::AdfLinkedServices
        | HandlerKind::AdfTriggers
        | HandlerKind::AdfPipelines
        | HandlerKind::AdfIntegrationRuntime
        | HandlerKind::AdfManagedPrivateEndpoint => "2018-06-01",
        HandlerKind::KeyVault => "2023-07-01",
        HandlerKind::BatchPool => "2024-02-01",
        HandlerKind::Locks => "2016-09-01",
    }
}

/// Path segments of the collection a kind operates on
fn collection_segments(params: &HandlerParams) -> TriageResult<Vec<String>> {
    let kind = params.kind();
    if kind == HandlerKind::Subscriptions {
        return Ok(vec!["subscriptions".to_string()]);
    }

    let mut segments = vec![
        "subscriptions".to_string(),
        params.require(ContextField::AccountId)?.to_string(),
    ];
    let group = params.get(ContextField::GroupName);
    match kind {
        HandlerKind::ResourceGroups => {
            segments.push("resourcegroups".to_string());
            return Ok(segments);
        }
        HandlerKind::Resources => {
            if let Some(group) = group {
                segments.extend(["resourceGroups".to_string(), group.to_string()]);
            }
            segments.push("resources".to_string());
            return Ok(segments);
        }
        _ => {}
    }

    segments.extend([
        "resourceGroups".to_string(),
        params.require(ContextField::GroupName)?.to_string(),
        "providers".to_string(),
    ]);
    if kind == HandlerKind::Locks {
        segments.extend(["Microsoft.Authorization".to_string(), "locks".to_string()]);
        return Ok(segments);
    }

    let name = params.require(ContextField::ResourceName)?.to_string();
    let tail: &[&str] = match kind {
        HandlerKind::AdfLinkedServices => &["Microsoft.DataFactory", "factories", "", "linkedservices"],
        HandlerKind::AdfTriggers => &["Microsoft.DataFactory", "factories", "", "triggers"],
        HandlerKind::AdfPipelines => &["Microsoft.DataFactory", "factories", "", "pipelines"],
        HandlerKind::AdfIntegrationRuntime => {
            &["Microsoft.DataFactory", "factories", "", "integrationRuntimes"]
        }
        HandlerKind::AdfManagedPrivateEndpoint => &[
            "Microsoft.DataFactory",
            "factories",
            "",
            "managedVirtualNetworks",
            "default",
            "managedPrivateEndpoints",
        ],
        HandlerKind::KeyVault => &["Microsoft.KeyVault", "vaults", "", "secrets"],
        HandlerKind::BatchPool => &["Microsoft.Batch", "batchAccounts", "", "pools"],
        _ => &[],
    };
    // the empty segment is the resource name slot
    segments.extend(tail.iter().map(|s| {
        if s.is_empty() {
            name.clone()
        } else {
            s.to_string()
        }
    }));
    Ok(segments)
}

pub(crate) fn operation_specs(kind: HandlerKind) -> Vec<OperationSpec> {
    let mut ops = vec![OperationSpec::new(
        "list",
        format!("List {} in the current context", kind.label()),
        json!({"type": "object", "properties": {}}),
    )];
    if kind == HandlerKind::Resources {
        return ops;
    }
    let name_hint = match kind {
        HandlerKind::BatchPool => "Pool name; defaults to the pool in context",
        HandlerKind::Subscriptions => "Subscription id",
        _ => "Name of the item",
    };
    ops.push(OperationSpec::new(
        "get",
        format!("Get one of the {}", kind.label()),
        json!({
            "type": "object",
            "properties": {"name": {"type": "string", "description": name_hint}},
            "required": if kind == HandlerKind::BatchPool { json!([]) } else { json!(["name"]) },
        }),
    ));
    if !matches!(kind, HandlerKind::Subscriptions | HandlerKind::ResourceGroups) {
        ops.push(OperationSpec::new(
            "update",
            format!("Create or update one of the {} with the given properties", kind.label()),
            json!({
                "type": "object",
                "properties": {
                    "name": {"type": "string"},
                    "properties": {"type": "object"}
                },
                "required": ["name", "properties"],
            }),
        ));
    }
    ops
}

/// Builds `ArmHandle`s
pub struct ArmHandlerBuilder {
    http: reqwest::Client,
    endpoint: String,
    request_timeout: Duration,
    logger: SharedLogger,
}

impl ArmHandlerBuilder {
    pub fn new() -> Self {
        Self {
            http: reqwest::Client::new(),
            endpoint: ARM_ENDPOINT.to_string(),
            request_timeout: TimeoutSettings::default().request(),
            logger: Arc::new(NoOpLogger::new()),
        }
    }

    /// Upper bound for one request, including reading the body
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// Sovereign clouds and test servers
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    pub fn with_logger(mut self, logger: SharedLogger) -> Self {
        self.logger = logger;
        self
    }
}

impl Default for ArmHandlerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl HandlerBuilder for ArmHandlerBuilder {
    async fn build(
        &self,
        params: &HandlerParams,
        auth: Arc<TokenCache>,
    ) -> TriageResult<Arc<dyn ResourceHandle>> {
        let mut collection = Url::parse(&self.endpoint).map_err(|e| {
            TriageError::remote("build handler", params.redacted(), format!("bad endpoint: {}", e))
        })?;
        collection
            .path_segments_mut()
            .map_err(|_| TriageError::remote("build handler", params.redacted(), "endpoint cannot hold a path"))?
            .pop_if_empty()
            .extend(collection_segments(params)?);

        // fail here rather than on first use when the credential is broken
        auth.get_token().await?;
        log_debug!(self.logger, "[ArmHandlerBuilder] handle ready ({})", params.redacted());

        Ok(Arc::new(ArmHandle {
            http: self.http.clone(),
            collection,
            params: params.clone(),
            auth,
            request_timeout: self.request_timeout,
        }))
    }
}

/// Thin ARM client for one collection
pub struct ArmHandle {
    http: reqwest::Client,
    collection: Url,
    params: HandlerParams,
    auth: Arc<TokenCache>,
    request_timeout: Duration,
}

impl ArmHandle {
    pub fn collection_url(&self) -> &Url {
        &self.collection
    }

    fn item_url(&self, name: &str) -> Url {
        let mut url = self.collection.clone();
        if let Ok(mut segments) = url.path_segments_mut() {
            segments.push(name);
        }
        url
    }

    fn with_version(&self, mut url: Url) -> Url {
        if !url.query_pairs().any(|(k, _)| k == "api-version") {
            url.query_pairs_mut()
                .append_pair("api-version", api_version(self.params.kind()));
        }
        url
    }

    fn item_name(&self, args: &Value) -> TriageResult<String> {
        if let Some(name) = args.get("name").and_then(|v| v.as_str()).filter(|s| !s.is_empty()) {
            return Ok(name.to_string());
        }
        if self.params.kind() == HandlerKind::BatchPool {
            return Ok(self.params.require(ContextField::PoolName)?.to_string());
        }
        Err(TriageError::Tool("missing required argument 'name'".to_string()))
    }

    async fn send(&self, operation: &str, method: Method, url: Url, body: Option<Value>) -> TriageResult<Value> {
        let token = self.auth.get_token().await?;
        let mut request = self.http.request(method, url).bearer_auth(token);
        if let Some(body) = body {
            request = request.json(&body);
        }
        bounded(operation, self.request_timeout, async {
            let response = request
                .send()
                .await
                .map_err(|e| self.failure(operation, e.to_string()))?;

            let status = response.status();
            let body = response
                .bytes()
                .await
                .map_err(|e| self.failure(operation, e.to_string()))?;
            if status.is_success() {
                if body.is_empty() {
                    return Ok(Value::Null);
                }
                return serde_json::from_slice(&body).map_err(|e| {
                    self.failure(operation, format!("unreadable response (HTTP {}): {}", status.as_u16(), e))
                });
            }

            // error bodies are best effort; the status alone is enough
            let payload: Value = serde_json::from_slice(&body).unwrap_or(Value::Null);
            let message = payload
                .pointer("/error/message")
                .and_then(|m| m.as_str())
                .unwrap_or_else(|| status.canonical_reason().unwrap_or("request failed"));
            Err(self.failure(operation, format!("HTTP {}: {}", status.as_u16(), message)))
        })
        .await
    }

    async fn list(&self) -> TriageResult<Value> {
        let operation = format!("list {}", self.params.kind().label());
        let mut items = Vec::new();
        let mut next = Some(self.with_version(self.collection.clone()));
        let mut pages = 0;

        while let Some(url) = next.take() {
            let page = self.send(&operation, Method::GET, url, None).await?;
            if let Some(values) = page.get("value").and_then(|v| v.as_array()) {
                items.extend(values.iter().cloned());
            }
            pages += 1;
            if pages >= MAX_PAGES {
                break;
            }
            next = page
                .get("nextLink")
                .and_then(|v| v.as_str())
                .and_then(|link| Url::parse(link).ok());
        }
        Ok(json!({ "value": items }))
    }

    fn failure(&self, operation: &str, message: String) -> TriageError {
        TriageError::remote(operation, self.params.redacted(), message)
    }
}

#[async_trait]
impl ResourceHandle for ArmHandle {
    fn kind(&self) -> HandlerKind {
        self.params.kind()
    }

    fn operations(&self) -> Vec<OperationSpec> {
        operation_specs(self.params.kind())
    }

    async fn invoke(&self, operation: &str, args: Value) -> TriageResult<Value> {
        let kind = self.params.kind();
        if !self.operations().iter().any(|op| op.name == operation) {
            return Err(TriageError::Tool(format!(
                "'{}' is not available for {}",
                operation,
                kind.label()
            )));
        }
        match operation {
            "list" => self.list().await,
            "get" => {
                let url = self.with_version(self.item_url(&self.item_name(&args)?));
                self.send(&format!("get {}", kind.label()), Method::GET, url, None).await
            }
            _ => {
                let url = self.with_version(self.item_url(&self.item_name(&args)?));
                let properties = args.get("properties").cloned().unwrap_or_else(|| json!({}));
                self.send(
                    &format!("update {}", kind.label()),
                    Method::PUT,
                    url,
                    Some(json!({ "properties": properties })),
                )
                .await
            }
        }
    }
}
