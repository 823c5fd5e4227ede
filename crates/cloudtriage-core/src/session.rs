//! Orchestrator wiring and per-conversation sessions

use std::sync::Arc;

use crate::auth::TokenCache;
use crate::config::Settings;
use crate::context::ContextStore;
use crate::error::{TriageError, TriageResult};
use crate::guardrail::{GuardrailGate, ListingVerifier};
use crate::handlers::{ArmHandlerBuilder, HandlerBuilder, HandlerFactory};
use crate::logging::{NoOpLogger, SharedLogger};
use crate::mcp::McpClient;
use crate::providers::{ChatModel, GenaiModel};
use crate::router::{
    McpSpecialist, ModelRouteDecider, ResourceSpecialist, RouteResponse, Router, SpecialistKind,
    SpecialistRegistry,
};
use crate::secrets::create_secret_store;
use crate::tools::{SpecialistToolset, ToolCatalog, ToolFilter};
use crate::types::{CancellationToken, ChatMessage, Transcript};
use crate::{log_info, log_warn};

/// Shared services for every conversation
///
/// The token cache, handler factory and router are built once; each
/// `Session` gets its own `ContextStore`.
pub struct Orchestrator {
    router: Arc<Router>,
    auth: Arc<TokenCache>,
    logger: SharedLogger,
}

impl Orchestrator {
    pub fn new(router: Router, auth: Arc<TokenCache>) -> Self {
        Self {
            router: Arc::new(router),
            auth,
            logger: Arc::new(NoOpLogger::new()),
        }
    }

    pub fn with_logger(mut self, logger: SharedLogger) -> Self {
        self.logger = logger;
        self
    }

    /// Production wiring: ARM handlers, the configured model, MCP when enabled
    pub async fn from_settings(settings: &Settings, logger: SharedLogger) -> TriageResult<Self> {
        settings.validate()?;
        let secrets = create_secret_store(&settings.auth.secret_store)?;

        let auth = Arc::new(
            TokenCache::from_settings(&settings.auth, &settings.timeouts, secrets.clone())
                .with_logger(logger.clone()),
        );
        let builder = Arc::new(
            ArmHandlerBuilder::new()
                .with_request_timeout(settings.timeouts.request())
                .with_logger(logger.clone()),
        );
        let model = Arc::new(
            GenaiModel::from_settings(&settings.model, &settings.timeouts, secrets)?
                .with_logger(logger.clone()),
        );
        let catalog: Option<Arc<dyn ToolCatalog>> = if settings.mcp.enabled {
            let client: Arc<dyn ToolCatalog> = Arc::new(
                McpClient::connect(&settings.mcp, settings.timeouts.tool_catalog(), logger.clone()).await?,
            );
            Some(client)
        } else {
            None
        };

        Self::assemble(settings, auth, builder, model, catalog, logger).await
    }

    /// Wire the router from explicit collaborators
    pub async fn assemble(
        settings: &Settings,
        auth: Arc<TokenCache>,
        builder: Arc<dyn HandlerBuilder>,
        model: Arc<dyn ChatModel>,
        catalog: Option<Arc<dyn ToolCatalog>>,
        logger: SharedLogger,
    ) -> TriageResult<Self> {
        let factory = Arc::new(
            HandlerFactory::with_settings(builder, &settings.handler_cache, &settings.timeouts)
                .with_logger(logger.clone()),
        );

        let verifier = ListingVerifier::new(factory.clone())
            .with_phrases(settings.guardrail.clone())
            .with_logger(logger.clone());
        let gate = GuardrailGate::new(Arc::new(verifier))
            .with_phrases(settings.guardrail.clone())
            .with_timeout(settings.timeouts.verification())
            .with_logger(logger.clone());

        let mut registry = SpecialistRegistry::new();
        for kind in SpecialistKind::ALL.into_iter().filter(|k| *k != SpecialistKind::AzureMcp) {
            registry = registry.register(Arc::new(
                ResourceSpecialist::new(kind, factory.clone(), model.clone()).with_logger(logger.clone()),
            ));
        }
        if let Some(catalog) = catalog {
            let filter = ToolFilter::from_settings(&settings.mcp);
            let toolset = SpecialistToolset::connect_with(
                catalog,
                &filter,
                settings.timeouts.tool_catalog(),
                logger.clone(),
            )
            .await?;
            registry = registry.register(Arc::new(
                McpSpecialist::new(toolset, model.clone()).with_logger(logger.clone()),
            ));
        }
        log_info!(logger, "[Orchestrator] {} specialists registered", registry.len());

        let decider = Arc::new(ModelRouteDecider::new(model).with_logger(logger.clone()));
        let router = Router::new(gate, decider, registry, factory)
            .with_aliases(settings.subscriptions.clone())
            .with_logger(logger.clone());
        Ok(Self::new(router, auth).with_logger(logger))
    }

    pub fn router(&self) -> &Arc<Router> {
        &self.router
    }

    /// Start a conversation with an empty context
    pub fn session(&self) -> Session {
        Session {
            router: self.router.clone(),
            context: Arc::new(ContextStore::with_auth(self.auth.clone())),
            transcript: Transcript::new(),
            cancel: CancellationToken::new(),
            logger: self.logger.clone(),
        }
    }
}

/// One conversation: its context, its transcript
pub struct Session {
    router: Arc<Router>,
    context: Arc<ContextStore>,
    transcript: Transcript,
    cancel: CancellationToken,
    logger: SharedLogger,
}

impl Session {
    pub fn context(&self) -> &Arc<ContextStore> {
        &self.context
    }

    pub fn transcript(&self) -> &Transcript {
        &self.transcript
    }

    /// Token that cancels the turn in flight
    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Route one operator request and record both turns
    pub async fn ask(&mut self, text: impl Into<String>) -> TriageResult<RouteResponse> {
        self.transcript.push(ChatMessage::user(text));
        match self.router.route(&self.transcript, &self.context, &self.cancel).await {
            Ok(response) => {
                self.transcript.push(ChatMessage::assistant(response.text.clone()));
                Ok(response)
            }
            Err(TriageError::Cancelled) => {
                log_warn!(self.logger, "[Session] turn cancelled");
                self.cancel = CancellationToken::new();
                Err(TriageError::Cancelled)
            }
            Err(e) => Err(e),
        }
    }
}
