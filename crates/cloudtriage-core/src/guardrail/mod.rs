//! Pre-handoff existence checks
//!
//! Two checks run in order, resource group first, then resource. Each one
//! passes without verification when the request is generic, when it is a
//! same-scope follow-up and the context already has a scope, or when it
//! names nothing of that type; otherwise the `Verifier` decides. A verdict
//! with `exists = false` trips the gate.

mod phrases;
mod verdict;
mod gate;
mod listing;

pub use phrases::{GuardrailPhrases, Tokens};
pub use verdict::{CheckKind, GuardrailVerdict, GateOutcome, Verifier};
pub use gate::GuardrailGate;
pub use listing::{ListingVerifier, mentioned_names, resolve_name};
