//! Canned handler builder for testing
//!
//! Serves fixed collections per handler kind without network access and
//! records every invocation. Builds still go through the token cache, so
//! credential behaviour stays observable.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::{json, Value};

use super::arm::operation_specs;
use super::handle::{HandlerBuilder, OperationSpec, ResourceHandle};
use super::kind::HandlerKind;
use super::params::HandlerParams;
use crate::auth::TokenCache;
use crate::context::ContextField;
use crate::error::{TriageError, TriageResult};

/// One recorded `invoke` call
#[derive(Debug, Clone, PartialEq)]
pub struct Invocation {
    pub kind: HandlerKind,
    pub operation: String,
    pub args: Value,
    /// Account the handle was built for
    pub account_id: Option<String>,
}

#[derive(Default)]
struct Shared {
    items: Mutex<HashMap<HandlerKind, Vec<Value>>>,
    invocations: Mutex<Vec<Invocation>>,
}

/// Builder whose handles answer from in-memory collections
#[derive(Default)]
pub struct CannedHandlerBuilder {
    shared: Arc<Shared>,
    builds: AtomicUsize,
}

impl CannedHandlerBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Items returned by `list` for `kind`
    pub fn with_items(self, kind: HandlerKind, items: Vec<Value>) -> Self {
        self.shared.items.lock().insert(kind, items);
        self
    }

    /// Shorthand for items that only carry a name (and optional type)
    pub fn with_names(self, kind: HandlerKind, names: &[&str]) -> Self {
        let items = names.iter().map(|n| json!({ "name": n })).collect();
        self.with_items(kind, items)
    }

    pub fn builds(&self) -> usize {
        self.builds.load(Ordering::SeqCst)
    }

    pub fn invocations(&self) -> Vec<Invocation> {
        self.shared.invocations.lock().clone()
    }
}

#[async_trait]
impl HandlerBuilder for CannedHandlerBuilder {
    async fn build(
        &self,
        params: &HandlerParams,
        auth: Arc<TokenCache>,
    ) -> TriageResult<Arc<dyn ResourceHandle>> {
        auth.get_token().await?;
        self.builds.fetch_add(1, Ordering::SeqCst);
        Ok(Arc::new(CannedHandle {
            params: params.clone(),
            shared: self.shared.clone(),
        }))
    }
}

struct CannedHandle {
    params: HandlerParams,
    shared: Arc<Shared>,
}

#[async_trait]
impl ResourceHandle for CannedHandle {
    fn kind(&self) -> HandlerKind {
        self.params.kind()
    }

    fn operations(&self) -> Vec<OperationSpec> {
        operation_specs(self.params.kind())
    }

    async fn invoke(&self, operation: &str, args: Value) -> TriageResult<Value> {
        let kind = self.params.kind();
        self.shared.invocations.lock().push(Invocation {
            kind,
            operation: operation.to_string(),
            args: args.clone(),
            account_id: self.params.get(ContextField::AccountId).map(str::to_string),
        });

        let items = self.shared.items.lock().get(&kind).cloned().unwrap_or_default();
        match operation {
            "list" => Ok(json!({ "value": items })),
            "get" | "update" => {
                let name = args.get("name").and_then(|v| v.as_str()).unwrap_or_default();
                items
                    .into_iter()
                    .find(|item| item.get("name").and_then(|v| v.as_str()) == Some(name))
                    .ok_or_else(|| {
                        TriageError::remote(
                            format!("{} {}", operation, kind.label()),
                            self.params.redacted(),
                            format!("HTTP 404: '{}' not found", name),
                        )
                    })
            }
            other => Err(TriageError::Tool(format!(
                "'{}' is not available for {}",
                other,
                kind.label()
            ))),
        }
    }
}
