//! Tool filtering and per-specialist tool sets
//!
//! ```text
//!  ToolCatalog (MCP server, ...)
//!        │ list_tools, once per connection
//!        ▼
//!  ToolFilter ── exact names, prefixes, infix patterns
//!        │
//!        ▼
//!  SpecialistToolset ── frozen Arc<[ToolDescriptor]>, refuses other names
//! ```

mod filter;
mod catalog;

pub use filter::ToolFilter;
pub use catalog::{SpecialistToolset, StaticToolCatalog, ToolCatalog};
