//! Per-conversation request context
//!
//! One `ContextStore` lives for the whole conversation and is shared by
//! `Arc` between the router and whichever specialist is active. Fields only
//! ever go from empty to set through `set_if_absent`; changing a set value
//! takes an explicit `replace` or `clear`.

mod field;
mod store;
mod update;

pub use field::{ContextField, ContextSnapshot, redact_account_id};
pub use store::ContextStore;
pub use update::{ContextUpdate, ContextReport};
