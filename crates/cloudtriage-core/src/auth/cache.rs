//! Token cache with expiry skew

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Mutex;

use super::credentials::default_credential;
use super::token::{AccessToken, Clock, SystemClock, DEFAULT_EXPIRY_SKEW};
use super::traits::{AuthError, AuthResult, CredentialProvider};
use crate::config::{AuthSettings, TimeoutSettings};
use crate::logging::{NoOpLogger, SharedLogger};
use crate::log_debug;
use crate::secrets::{EnvSecretStore, SecretStore};

/// Holds at most one token per scope and refreshes it lazily
///
/// Refresh happens under an async mutex, so concurrent callers that find the
/// token stale trigger exactly one acquisition and all receive its result.
pub struct TokenCache {
    provider: Arc<dyn CredentialProvider>,
    scope: String,
    skew: Duration,
    acquire_timeout: Duration,
    clock: Arc<dyn Clock>,
    logger: SharedLogger,
    held: Mutex<Option<AccessToken>>,
}

impl TokenCache {
    pub fn new(provider: Arc<dyn CredentialProvider>, scope: impl Into<String>) -> Self {
        Self {
            provider,
            scope: scope.into(),
            skew: DEFAULT_EXPIRY_SKEW,
            acquire_timeout: TimeoutSettings::default().credential(),
            clock: Arc::new(SystemClock),
            logger: Arc::new(NoOpLogger::new()),
            held: Mutex::new(None),
        }
    }

    /// Cache over the credential chain for `settings`
    pub fn from_settings(
        settings: &AuthSettings,
        timeouts: &TimeoutSettings,
        secrets: Arc<dyn SecretStore>,
    ) -> Self {
        Self::new(default_credential(settings, secrets), settings.scope.clone())
            .with_timeout(timeouts.credential())
    }

    /// Client secret from the environment, then the Azure CLI
    pub fn from_default_chain() -> Self {
        Self::from_settings(
            &AuthSettings::default(),
            &TimeoutSettings::default(),
            Arc::new(EnvSecretStore::new()),
        )
    }

    pub fn with_skew(mut self, skew: Duration) -> Self {
        self.skew = skew;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.acquire_timeout = timeout;
        self
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_logger(mut self, logger: SharedLogger) -> Self {
        self.logger = logger;
        self
    }

    pub fn scope(&self) -> &str {
        &self.scope
    }

    /// A bearer token valid for at least the skew window
    pub async fn get_token(&self) -> AuthResult<String> {
        let mut held = self.held.lock().await;
        if let Some(token) = held.as_ref() {
            if token.is_valid_at(self.clock.now(), self.skew) {
                return Ok(token.value.clone());
            }
        }

        log_debug!(self.logger, "[TokenCache] acquiring token via {}", self.provider.name());
        let fresh = tokio::time::timeout(self.acquire_timeout, self.provider.acquire(&self.scope))
            .await
            .map_err(|_| AuthError::Timeout(self.acquire_timeout))??;
        log_debug!(
            self.logger,
            "[TokenCache] token acquired, valid for {}s",
            fresh.remaining(self.clock.now()).as_secs()
        );

        let value = fresh.value.clone();
        *held = Some(fresh);
        Ok(value)
    }

    /// Drop the held token so the next call acquires a new one
    pub async fn invalidate(&self) {
        *self.held.lock().await = None;
    }
}

impl std::fmt::Debug for TokenCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenCache")
            .field("provider", &self.provider.name())
            .field("scope", &self.scope)
            .field("skew", &self.skew)
            .finish()
    }
}
