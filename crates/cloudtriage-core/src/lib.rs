//! cloudtriage core
//!
//! Routes natural-language operator requests to cloud automation
//! specialists. The pieces that carry state across turns live here:
//!
//! - `auth`: one management-plane token, refreshed 5 minutes before expiry
//! - `context`: the per-conversation `ContextStore`, shared by `Arc`
//! - `handlers`: the memoizing `HandlerFactory` (bounded LRU with a TTL)
//! - `guardrail`: the two-check gate that runs before any handoff
//! - `router`: gate, one decision, at most one specialist
//! - `tools` / `mcp`: the filtered MCP tool set for the generic specialist
//!
//! ```rust,ignore
//! use cloudtriage_core::{Orchestrator, LayeredConfigProvider, ConfigProvider, ConsoleLogger};
//!
//! let settings = LayeredConfigProvider::discover(None).load().await?;
//! let orchestrator = Orchestrator::from_settings(&settings, Arc::new(ConsoleLogger::new())).await?;
//!
//! let mut session = orchestrator.session();
//! let reply = session.ask("List all subscriptions I have access to").await?;
//! println!("{}", reply.text);
//! ```

pub mod types;
pub mod logging;
pub mod error;
pub mod secrets;
pub mod config;
pub mod remote;
pub mod auth;
pub mod context;
pub mod handlers;
pub mod guardrail;
pub mod providers;
pub mod tools;
pub mod mcp;
pub mod router;
pub mod session;

// Re-export commonly used types
pub use types::{CancellationToken, ChatMessage, MessageRole, ToolCall, ToolDescriptor, ToolOutput, Transcript};

pub use error::{TriageError, TriageResult};

pub use logging::{ConsoleLogger, Logger, MemoryLogger, NoOpLogger, SharedLogger};

pub use secrets::{
    create_secret_store, ChainSecretStore, EnvSecretStore, KeychainSecretStore, MemorySecretStore,
    SecretStore, SecretStoreError,
};

pub use config::{ConfigProvider, LayeredConfigProvider, MemoryConfigProvider, Settings};

pub use auth::{AccessToken, AuthError, CredentialProvider, StaticCredential, TokenCache};

pub use context::{ContextField, ContextReport, ContextSnapshot, ContextStore, ContextUpdate};

pub use handlers::{
    ArmHandlerBuilder, CannedHandlerBuilder, HandlerBuilder, HandlerFactory, HandlerKind, ResourceHandle,
};

pub use guardrail::{CheckKind, GateOutcome, GuardrailGate, GuardrailVerdict, ListingVerifier, Verifier};

pub use providers::{ChatModel, GenaiModel, MockModel, ModelTurn, ProviderError};

pub use tools::{SpecialistToolset, StaticToolCatalog, ToolCatalog, ToolFilter};

pub use mcp::{McpClient, McpError};

pub use router::{
    ModelRouteDecider, RouteDecider, RouteDecision, RouteOutcome, RouteResponse, Router, Specialist,
    SpecialistKind, SpecialistRegistry,
};

pub use session::{Orchestrator, Session};
