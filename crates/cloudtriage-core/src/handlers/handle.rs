//! Service handle seams

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use super::kind::HandlerKind;
use super::params::HandlerParams;
use crate::auth::TokenCache;
use crate::error::TriageResult;

/// One operation a handle can run, described for the model
#[derive(Debug, Clone, PartialEq)]
pub struct OperationSpec {
    pub name: String,
    pub description: String,
    /// JSON schema for the `args` passed to `invoke`
    pub input_schema: Value,
}

impl OperationSpec {
    pub fn new(name: impl Into<String>, description: impl Into<String>, input_schema: Value) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            input_schema,
        }
    }
}

/// A live, authenticated client for one handler kind and context
#[async_trait]
pub trait ResourceHandle: Send + Sync {
    fn kind(&self) -> HandlerKind;

    fn operations(&self) -> Vec<OperationSpec>;

    async fn invoke(&self, operation: &str, args: Value) -> TriageResult<Value>;
}

/// Builds handles on a cache miss
#[async_trait]
pub trait HandlerBuilder: Send + Sync {
    async fn build(
        &self,
        params: &HandlerParams,
        auth: Arc<TokenCache>,
    ) -> TriageResult<Arc<dyn ResourceHandle>>;
}
