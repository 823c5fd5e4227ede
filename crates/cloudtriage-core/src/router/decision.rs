//! Routing decisions and the model-driven decider

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{json, Value};

use super::kind::SpecialistKind;
use crate::context::{ContextSnapshot, ContextUpdate};
use crate::error::{TriageError, TriageResult};
use crate::logging::{NoOpLogger, SharedLogger};
use crate::providers::{ChatModel, ModelTurn};
use crate::types::{ToolCall, ToolDescriptor, Transcript};
use crate::log_info;

/// The one thing the router does with a request
#[derive(Debug, Clone, PartialEq)]
pub enum RouteDecision {
    /// Reply directly
    Answer(String),
    /// Record context, optionally handing off afterwards
    SetContext {
        update: ContextUpdate,
        handoff: Option<SpecialistKind>,
    },
    ListSubscriptions,
    /// Subscription id, display name or configured alias
    SwitchSubscription(String),
    Handoff(SpecialistKind),
}

/// Picks the decision for a turn; the language-driven part of routing
#[async_trait]
pub trait RouteDecider: Send + Sync {
    async fn decide(
        &self,
        transcript: &Transcript,
        context: &ContextSnapshot,
        specialists: &[SpecialistKind],
    ) -> TriageResult<RouteDecision>;
}

pub const SET_CONTEXT_TOOL: &str = "set_context";
pub const LIST_SUBSCRIPTIONS_TOOL: &str = "list_subscriptions";
pub const SWITCH_SUBSCRIPTION_TOOL: &str = "switch_subscription";

const ROUTER_PROMPT: &str = "You are the triage agent for Azure operations. \
Decide how to handle the operator's latest request. \
Record any subscription, resource group, resource or pool the operator names with set_context. \
Use list_subscriptions or switch_subscription for subscription questions. \
Hand off to exactly one specialist with a transfer_to_* tool when the request needs one. \
Otherwise answer briefly.";

/// Decider that lets a chat model pick a routing tool
pub struct ModelRouteDecider {
    model: Arc<dyn ChatModel>,
    logger: SharedLogger,
}

impl ModelRouteDecider {
    pub fn new(model: Arc<dyn ChatModel>) -> Self {
        Self {
            model,
            logger: Arc::new(NoOpLogger::new()),
        }
    }

    pub fn with_logger(mut self, logger: SharedLogger) -> Self {
        self.logger = logger;
        self
    }

    /// Routing tools offered to the model
    pub fn tools(specialists: &[SpecialistKind]) -> Vec<ToolDescriptor> {
        let names: Vec<&str> = specialists.iter().map(|k| k.as_str()).collect();
        let mut tools = vec![
            ToolDescriptor::new(
                SET_CONTEXT_TOOL,
                "Record identifying details the operator gave. Values already known are kept.",
            )
            .with_schema(json!({
                "type": "object",
                "properties": {
                    "subscription_id": {"type": "string"},
                    "subscription_name": {"type": "string"},
                    "resource_group_name": {"type": "string"},
                    "resource_name": {"type": "string"},
                    "pool_name": {"type": "string"},
                    "intent": {"type": "string"},
                    "transfer_to": {"type": "string", "enum": names}
                }
            })),
            ToolDescriptor::new(LIST_SUBSCRIPTIONS_TOOL, "List the subscriptions the operator can access.")
                .with_schema(json!({"type": "object", "properties": {}})),
            ToolDescriptor::new(
                SWITCH_SUBSCRIPTION_TOOL,
                "Switch to another subscription by id, name or alias.",
            )
            .with_schema(json!({
                "type": "object",
                "properties": {"subscription": {"type": "string"}},
                "required": ["subscription"]
            })),
        ];
        tools.extend(specialists.iter().map(|kind| {
            ToolDescriptor::new(kind.transfer_tool(), kind.description())
                .with_schema(json!({"type": "object", "properties": {}}))
        }));
        tools
    }

    fn prompt(context: &ContextSnapshot) -> String {
        if context.is_empty() {
            format!("{}\n\nKnown context: none.", ROUTER_PROMPT)
        } else {
            format!("{}\n\nKnown context: {}", ROUTER_PROMPT, context.redacted())
        }
    }
}

/// Map a routing tool call onto a decision
pub fn decision_from_call(call: &ToolCall, specialists: &[SpecialistKind]) -> TriageResult<RouteDecision> {
    let registered = |kind: SpecialistKind| -> TriageResult<SpecialistKind> {
        if specialists.contains(&kind) {
            Ok(kind)
        } else {
            Err(TriageError::UnknownSpecialist(kind.to_string()))
        }
    };

    match call.name.as_str() {
        SET_CONTEXT_TOOL => {
            let handoff = match call.get_arg_str("transfer_to").filter(|s| !s.is_empty()) {
                Some(name) => Some(registered(name.parse()?)?),
                None => None,
            };
            Ok(RouteDecision::SetContext {
                update: ContextUpdate::from_arguments(&without_key(&call.input, "transfer_to")),
                handoff,
            })
        }
        LIST_SUBSCRIPTIONS_TOOL => Ok(RouteDecision::ListSubscriptions),
        SWITCH_SUBSCRIPTION_TOOL => call
            .get_arg_str("subscription")
            .filter(|s| !s.trim().is_empty())
            .map(|s| RouteDecision::SwitchSubscription(s.trim().to_string()))
            .ok_or_else(|| TriageError::Tool("switch_subscription needs a subscription".to_string())),
        name => match SpecialistKind::from_transfer_tool(name) {
            Some(kind) => Ok(RouteDecision::Handoff(registered(kind)?)),
            None => Err(TriageError::Tool(format!("unknown routing tool '{}'", name))),
        },
    }
}

fn without_key(input: &Value, key: &str) -> Value {
    let mut input = input.clone();
    if let Some(map) = input.as_object_mut() {
        map.remove(key);
    }
    input
}

#[async_trait]
impl RouteDecider for ModelRouteDecider {
    async fn decide(
        &self,
        transcript: &Transcript,
        context: &ContextSnapshot,
        specialists: &[SpecialistKind],
    ) -> TriageResult<RouteDecision> {
        let tools = Self::tools(specialists);
        let turn = self.model.complete(&Self::prompt(context), transcript, &tools).await?;
        let decision = match turn {
            ModelTurn::Text(text) => RouteDecision::Answer(text),
            ModelTurn::ToolCall(call) => decision_from_call(&call, specialists)?,
        };
        log_info!(self.logger, "[ModelRouteDecider] decision: {}", decision_label(&decision));
        Ok(decision)
    }
}

fn decision_label(decision: &RouteDecision) -> String {
    match decision {
        RouteDecision::Answer(_) => "answer".to_string(),
        RouteDecision::SetContext { handoff: Some(kind), .. } => format!("set_context then {}", kind),
        RouteDecision::SetContext { .. } => "set_context".to_string(),
        RouteDecision::ListSubscriptions => "list_subscriptions".to_string(),
        RouteDecision::SwitchSubscription(_) => "switch_subscription".to_string(),
        RouteDecision::Handoff(kind) => format!("handoff to {}", kind),
    }
}
