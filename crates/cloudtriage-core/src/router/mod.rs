//! Request routing
//!
//! ```text
//!  request ──▶ GuardrailGate ──tripped──▶ Halted(verdict)
//!                  │ pass
//!                  ▼
//!             RouteDecider
//!      ┌───────────┼──────────────┐
//!      ▼           ▼              ▼
//!   Answer   local operation   Handoff ──▶ one Specialist(&Arc<ContextStore>)
//! ```
//!
//! The specialist receives the router's own `Arc<ContextStore>`, never a
//! copy, so names the gate confirmed are already in place when it runs.

mod kind;
mod decision;
mod specialist;
#[allow(clippy::module_inception)]
mod router;

pub use kind::SpecialistKind;
pub use decision::{
    decision_from_call, ModelRouteDecider, RouteDecider, RouteDecision, LIST_SUBSCRIPTIONS_TOOL,
    SET_CONTEXT_TOOL, SWITCH_SUBSCRIPTION_TOOL,
};
pub use specialist::{
    format_result, operation_tool_name, parse_operation_tool, McpSpecialist, ModelOperationPlanner,
    ResourceSpecialist, Specialist, SpecialistRegistry,
};
pub use router::{RouteOutcome, RouteResponse, Router};
