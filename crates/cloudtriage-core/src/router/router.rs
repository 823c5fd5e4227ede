//! The top-level routing loop

use std::collections::BTreeMap;
use std::sync::Arc;

use serde_json::{json, Value};

use super::decision::{RouteDecider, RouteDecision};
use super::kind::SpecialistKind;
use super::specialist::SpecialistRegistry;
use crate::context::{redact_account_id, ContextField, ContextStore, ContextUpdate};
use crate::error::{TriageError, TriageResult};
use crate::guardrail::{GateOutcome, GuardrailGate, GuardrailVerdict};
use crate::handlers::{HandlerFactory, HandlerKind};
use crate::logging::{NoOpLogger, SharedLogger};
use crate::types::{CancellationToken, Transcript};
use crate::{log_debug, log_error, log_info, log_warn};

/// How a turn ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RouteOutcome {
    /// Handled by the router itself
    Answered,
    /// Handled by exactly this specialist
    Handoff(SpecialistKind),
    /// The gate tripped; no specialist ran
    Halted(GuardrailVerdict),
    /// Something failed; the text is safe to show the operator
    Failed,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteResponse {
    pub outcome: RouteOutcome,
    pub text: String,
}

impl RouteResponse {
    fn answered(text: impl Into<String>) -> Self {
        Self {
            outcome: RouteOutcome::Answered,
            text: text.into(),
        }
    }
}

/// Gate, then one decision, then at most one specialist
pub struct Router {
    gate: GuardrailGate,
    decider: Arc<dyn RouteDecider>,
    specialists: SpecialistRegistry,
    factory: Arc<HandlerFactory>,
    /// Subscription alias → id
    aliases: BTreeMap<String, String>,
    logger: SharedLogger,
}

impl Router {
    pub fn new(
        gate: GuardrailGate,
        decider: Arc<dyn RouteDecider>,
        specialists: SpecialistRegistry,
        factory: Arc<HandlerFactory>,
    ) -> Self {
        Self {
            gate,
            decider,
            specialists,
            factory,
            aliases: BTreeMap::new(),
            logger: Arc::new(NoOpLogger::new()),
        }
    }

    pub fn with_aliases(mut self, aliases: BTreeMap<String, String>) -> Self {
        self.aliases = aliases;
        self
    }

    pub fn with_logger(mut self, logger: SharedLogger) -> Self {
        self.logger = logger;
        self
    }

    pub fn specialists(&self) -> &SpecialistRegistry {
        &self.specialists
    }

    pub fn factory(&self) -> &Arc<HandlerFactory> {
        &self.factory
    }

    /// Route the latest request in `transcript`
    ///
    /// Only cancellation is returned as an error; every other failure
    /// becomes a `Failed` response carrying an operator-facing message.
    pub async fn route(
        &self,
        transcript: &Transcript,
        context: &Arc<ContextStore>,
        cancel: &CancellationToken,
    ) -> TriageResult<RouteResponse> {
        let turn = cancel.run_until_cancelled(self.route_inner(transcript, context)).await;
        match turn {
            None => {
                log_warn!(self.logger, "[Router] request cancelled");
                Err(TriageError::Cancelled)
            }
            Some(Err(TriageError::Cancelled)) => Err(TriageError::Cancelled),
            Some(Err(e)) => {
                log_error!(self.logger, "[Router] request failed: {}", e);
                Ok(RouteResponse {
                    outcome: RouteOutcome::Failed,
                    text: e.user_message(),
                })
            }
            Some(Ok(response)) => Ok(response),
        }
    }

    async fn route_inner(
        &self,
        transcript: &Transcript,
        context: &Arc<ContextStore>,
    ) -> TriageResult<RouteResponse> {
        let request = transcript.latest_request().unwrap_or_default();

        if let GateOutcome::Tripped(verdict) = self.gate.evaluate(request, context).await? {
            return Ok(RouteResponse {
                text: verdict.reasoning.clone(),
                outcome: RouteOutcome::Halted(verdict),
            });
        }

        let kinds = self.specialists.kinds();
        let decision = self.decider.decide(transcript, &context.snapshot(), &kinds).await?;
        match decision {
            RouteDecision::Answer(text) => Ok(RouteResponse::answered(text)),
            RouteDecision::ListSubscriptions => self.list_subscriptions(context).await,
            RouteDecision::SwitchSubscription(target) => self.switch_subscription(&target, context).await,
            RouteDecision::SetContext { update, handoff } => {
                let status = self.set_context(&update, context);
                match handoff {
                    Some(kind) => self.hand_off(kind, transcript, context).await,
                    None => Ok(RouteResponse::answered(status)),
                }
            }
            RouteDecision::Handoff(kind) => self.hand_off(kind, transcript, context).await,
        }
    }

    fn set_context(&self, update: &ContextUpdate, context: &ContextStore) -> String {
        let report = context.apply(update);
        log_info!(
            self.logger,
            "[Router] context update: {} new, {} kept",
            report.newly_set.len(),
            report.already_available.len()
        );
        report.status_text()
    }

    async fn hand_off(
        &self,
        kind: SpecialistKind,
        transcript: &Transcript,
        context: &Arc<ContextStore>,
    ) -> TriageResult<RouteResponse> {
        let specialist = self.specialists.get(kind)?;
        log_info!(self.logger, "[Router] handing off to {}", kind);
        let text = specialist.handle(transcript, context).await?;
        Ok(RouteResponse {
            outcome: RouteOutcome::Handoff(kind),
            text,
        })
    }

    async fn subscriptions(&self, context: &ContextStore) -> TriageResult<Vec<Value>> {
        let handle = self.factory.get_handler(HandlerKind::Subscriptions, context).await?;
        let listing = handle.invoke("list", json!({})).await?;
        Ok(listing
            .get("value")
            .and_then(|v| v.as_array())
            .cloned()
            .unwrap_or_default())
    }

    async fn list_subscriptions(&self, context: &ContextStore) -> TriageResult<RouteResponse> {
        let subscriptions = self.subscriptions(context).await?;
        log_debug!(self.logger, "[Router] {} subscriptions visible", subscriptions.len());
        if subscriptions.is_empty() {
            return Ok(RouteResponse::answered("No subscriptions are available to these credentials."));
        }
        let lines: Vec<String> = subscriptions
            .iter()
            .map(|s| {
                let (id, name) = subscription_identity(s);
                format!("- {} ({})", name.unwrap_or(id), id)
            })
            .collect();
        Ok(RouteResponse::answered(format!(
            "You have access to {} subscriptions:\n{}",
            lines.len(),
            lines.join("\n")
        )))
    }

    fn resolve_alias<'a>(&'a self, target: &'a str) -> &'a str {
        self.aliases
            .iter()
            .find(|(alias, _)| alias.eq_ignore_ascii_case(target))
            .map(|(_, id)| id.as_str())
            .unwrap_or(target)
    }

    async fn switch_subscription(&self, target: &str, context: &ContextStore) -> TriageResult<RouteResponse> {
        let wanted = self.resolve_alias(target);
        let subscriptions = self.subscriptions(context).await?;
        let found = subscriptions.iter().map(subscription_identity).find(|(id, name)| {
            id.eq_ignore_ascii_case(wanted) || name.is_some_and(|n| n.eq_ignore_ascii_case(wanted))
        });

        let Some((id, name)) = found else {
            return Ok(RouteResponse::answered(format!(
                "I couldn't find a subscription matching '{}'. Ask me to list subscriptions to see the ones available.",
                target
            )));
        };

        context.replace(ContextField::AccountId, id);
        context.replace(ContextField::AccountDisplayName, name.unwrap_or_default());
        for field in [ContextField::GroupName, ContextField::ResourceName, ContextField::PoolName] {
            context.clear(field);
        }
        log_info!(self.logger, "[Router] switched subscription to {}", redact_account_id(id));
        Ok(RouteResponse::answered(format!(
            "Switched to subscription {} ({}).",
            name.unwrap_or(id),
            redact_account_id(id)
        )))
    }
}

/// `(subscriptionId, displayName)` of one listing entry
fn subscription_identity(item: &Value) -> (&str, Option<&str>) {
    let id = item
        .get("subscriptionId")
        .or_else(|| item.get("name"))
        .and_then(|v| v.as_str())
        .unwrap_or_default();
    let name = item.get("displayName").and_then(|v| v.as_str());
    (id, name)
}
