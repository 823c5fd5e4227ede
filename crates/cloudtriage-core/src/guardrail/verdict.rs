//! Verdicts and the verification seam

use std::fmt;

use async_trait::async_trait;
use serde::Serialize;

use crate::context::{ContextField, ContextStore};
use crate::error::TriageResult;

/// Which of the two gate checks produced a verdict
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CheckKind {
    ResourceGroup,
    Resource,
}

impl CheckKind {
    /// Field a confirmed name is written to
    pub fn field(&self) -> ContextField {
        match self {
            CheckKind::ResourceGroup => ContextField::GroupName,
            CheckKind::Resource => ContextField::ResourceName,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            CheckKind::ResourceGroup => "resource group",
            CheckKind::Resource => "resource",
        }
    }
}

impl fmt::Display for CheckKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GuardrailVerdict {
    pub exists: bool,
    pub resolved_name: String,
    pub reasoning: String,
    pub check: CheckKind,
    /// False when a skip tier decided without calling the verifier
    pub verified: bool,
}

impl GuardrailVerdict {
    /// Pass decided by a skip tier
    pub fn skipped(check: CheckKind, reasoning: impl Into<String>) -> Self {
        Self {
            exists: true,
            resolved_name: String::new(),
            reasoning: reasoning.into(),
            check,
            verified: false,
        }
    }

    pub fn found(check: CheckKind, name: impl Into<String>, reasoning: impl Into<String>) -> Self {
        Self {
            exists: true,
            resolved_name: name.into(),
            reasoning: reasoning.into(),
            check,
            verified: true,
        }
    }

    pub fn not_found(check: CheckKind, name: impl Into<String>, reasoning: impl Into<String>) -> Self {
        Self {
            exists: false,
            resolved_name: name.into(),
            reasoning: reasoning.into(),
            check,
            verified: true,
        }
    }
}

/// Result of running both checks
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GateOutcome {
    /// Both checks passed; one verdict per check, in order
    Pass(Vec<GuardrailVerdict>),
    /// The first failing verdict; later checks did not run
    Tripped(GuardrailVerdict),
}

impl GateOutcome {
    pub fn is_pass(&self) -> bool {
        matches!(self, GateOutcome::Pass(_))
    }
}

/// Decides whether the resource named in `text` exists
///
/// The gate owns the context writes; implementations only read it.
#[async_trait]
pub trait Verifier: Send + Sync {
    async fn verify(
        &self,
        check: CheckKind,
        context: &ContextStore,
        text: &str,
    ) -> TriageResult<GuardrailVerdict>;
}
