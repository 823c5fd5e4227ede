//! Handler factory
//!
//! Turns the request context into live, authenticated service handles.
//! Handles are memoized per `HandlerCacheKey` in a bounded LRU cache with a
//! TTL; concurrent first requests for the same key build exactly one handle.

mod kind;
mod params;
mod handle;
mod cache;
mod factory;
mod arm;
mod canned;

pub use kind::HandlerKind;
pub use params::{HandlerParams, HandlerCacheKey};
pub use handle::{ResourceHandle, HandlerBuilder, OperationSpec};
pub use cache::BoundedCache;
pub use factory::HandlerFactory;
pub use arm::{ArmHandlerBuilder, ArmHandle, ARM_ENDPOINT};
pub use canned::{CannedHandlerBuilder, Invocation};
