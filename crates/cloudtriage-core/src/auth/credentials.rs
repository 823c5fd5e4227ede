//! Credential providers

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, SystemTime};

use async_trait::async_trait;
use serde::Deserialize;

use super::token::{AccessToken, Clock, SystemClock};
use super::traits::{AuthError, AuthResult, CredentialProvider};
use crate::config::{AuthMethod, AuthSettings};
use crate::logging::file_logger as log;
use crate::secrets::SecretStore;

const COMPONENT: &str = "Credential";

/// Fixed token, re-issued with a fresh lifetime on every acquisition
pub struct StaticCredential {
    token: String,
    lifetime: Duration,
    clock: Arc<dyn Clock>,
    acquisitions: AtomicUsize,
}

impl StaticCredential {
    pub fn new(token: impl Into<String>, lifetime: Duration) -> Self {
        Self::with_clock(token, lifetime, Arc::new(SystemClock))
    }

    pub fn with_clock(token: impl Into<String>, lifetime: Duration, clock: Arc<dyn Clock>) -> Self {
        Self {
            token: token.into(),
            lifetime,
            clock,
            acquisitions: AtomicUsize::new(0),
        }
    }

    /// How many tokens have been issued so far
    pub fn acquisitions(&self) -> usize {
        self.acquisitions.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl CredentialProvider for StaticCredential {
    fn name(&self) -> &str {
        "static"
    }

    async fn acquire(&self, _scope: &str) -> AuthResult<AccessToken> {
        self.acquisitions.fetch_add(1, Ordering::SeqCst);
        Ok(AccessToken::new(self.token.clone(), self.clock.now() + self.lifetime))
    }
}

#[derive(Deserialize)]
struct TokenEndpointResponse {
    access_token: String,
    expires_in: u64,
}

/// OAuth2 client-credentials grant against the identity authority
///
/// Tenant and client ids come from settings, falling back to the secret
/// store (`tenant_id`, `client_id`); the secret is always read from the
/// store (`client_secret`).
pub struct ClientSecretCredential {
    authority: String,
    tenant_id: Option<String>,
    client_id: Option<String>,
    secrets: Arc<dyn SecretStore>,
    http: reqwest::Client,
}

impl ClientSecretCredential {
    pub fn new(settings: &AuthSettings, secrets: Arc<dyn SecretStore>) -> Self {
        Self {
            authority: settings.authority.trim_end_matches('/').to_string(),
            tenant_id: settings.tenant_id.clone(),
            client_id: settings.client_id.clone(),
            secrets,
            http: reqwest::Client::new(),
        }
    }

    fn resolve(&self, configured: &Option<String>, key: &str) -> AuthResult<String> {
        configured
            .clone()
            .filter(|v| !v.is_empty())
            .or_else(|| self.secrets.get(key))
            .ok_or_else(|| AuthError::Unavailable(format!("{} is not configured", key)))
    }

    fn token_url(&self, tenant_id: &str) -> String {
        format!("{}/{}/oauth2/v2.0/token", self.authority, tenant_id)
    }
}

#[async_trait]
impl CredentialProvider for ClientSecretCredential {
    fn name(&self) -> &str {
        "client_secret"
    }

    async fn acquire(&self, scope: &str) -> AuthResult<AccessToken> {
        let tenant_id = self.resolve(&self.tenant_id, "tenant_id")?;
        let client_id = self.resolve(&self.client_id, "client_id")?;
        let client_secret = self.resolve(&None, "client_secret")?;

        let response = self
            .http
            .post(self.token_url(&tenant_id))
            .form(&[
                ("grant_type", "client_credentials"),
                ("client_id", client_id.as_str()),
                ("client_secret", client_secret.as_str()),
                ("scope", scope),
            ])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(AuthError::Rejected {
                status: status.as_u16(),
                message: body.chars().take(300).collect(),
            });
        }

        let parsed: TokenEndpointResponse = response
            .json()
            .await
            .map_err(|e| AuthError::InvalidResponse(e.to_string()))?;
        log::debug(COMPONENT, &format!("client secret token issued, expires in {}s", parsed.expires_in));
        Ok(AccessToken::new(
            parsed.access_token,
            SystemTime::now() + Duration::from_secs(parsed.expires_in),
        ))
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct CliTokenResponse {
    access_token: String,
    /// Unix timestamp; reported by Azure CLI 2.54 and later
    #[serde(rename = "expires_on")]
    expires_on: Option<i64>,
}

/// Token from the signed-in Azure CLI (`az login`)
#[derive(Debug, Clone)]
pub struct CliCredential {
    program: String,
}

impl CliCredential {
    pub fn new() -> Self {
        let program = if cfg!(windows) { "az.cmd" } else { "az" };
        Self::with_program(program)
    }

    /// Use a different executable (tests, non-standard installs)
    pub fn with_program(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }

    /// Parse `az account get-access-token --output json`
    pub fn parse_output(stdout: &[u8]) -> AuthResult<AccessToken> {
        let parsed: CliTokenResponse = serde_json::from_slice(stdout)
            .map_err(|e| AuthError::InvalidResponse(e.to_string()))?;
        let expires_on = parsed.expires_on.ok_or_else(|| {
            AuthError::InvalidResponse("missing expires_on; upgrade the Azure CLI".to_string())
        })?;
        let secs = u64::try_from(expires_on)
            .map_err(|_| AuthError::InvalidResponse(format!("bad expires_on {}", expires_on)))?;
        Ok(AccessToken::new(
            parsed.access_token,
            SystemTime::UNIX_EPOCH + Duration::from_secs(secs),
        ))
    }
}

impl Default for CliCredential {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CredentialProvider for CliCredential {
    fn name(&self) -> &str {
        "azure_cli"
    }

    async fn acquire(&self, scope: &str) -> AuthResult<AccessToken> {
        let output = tokio::process::Command::new(&self.program)
            .args(["account", "get-access-token", "--scope", scope, "--output", "json"])
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| match e.kind() {
                std::io::ErrorKind::NotFound => {
                    AuthError::Unavailable(format!("'{}' not found on PATH", self.program))
                }
                _ => AuthError::Cli(e.to_string()),
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(AuthError::Cli(stderr.trim().chars().take(300).collect()));
        }
        Self::parse_output(&output.stdout)
    }
}

/// Tries each provider in order and returns the first token
pub struct ChainedCredential {
    providers: Vec<Arc<dyn CredentialProvider>>,
}

impl ChainedCredential {
    pub fn new(providers: Vec<Arc<dyn CredentialProvider>>) -> Self {
        Self { providers }
    }
}

#[async_trait]
impl CredentialProvider for ChainedCredential {
    fn name(&self) -> &str {
        "chain"
    }

    async fn acquire(&self, scope: &str) -> AuthResult<AccessToken> {
        let mut failures = Vec::with_capacity(self.providers.len());
        for provider in &self.providers {
            match provider.acquire(scope).await {
                Ok(token) => return Ok(token),
                Err(e) => {
                    log::debug(COMPONENT, &format!("{} failed: {}", provider.name(), e));
                    failures.push(format!("{}: {}", provider.name(), e));
                }
            }
        }
        Err(AuthError::Exhausted(failures))
    }
}

/// Credential for the configured auth method
///
/// `Default` tries the client secret first, then the Azure CLI.
pub fn default_credential(
    settings: &AuthSettings,
    secrets: Arc<dyn SecretStore>,
) -> Arc<dyn CredentialProvider> {
    match settings.method {
        AuthMethod::Cli => Arc::new(CliCredential::new()),
        AuthMethod::ClientSecret => Arc::new(ClientSecretCredential::new(settings, secrets)),
        AuthMethod::Default => Arc::new(ChainedCredential::new(vec![
            Arc::new(ClientSecretCredential::new(settings, secrets)),
            Arc::new(CliCredential::new()),
        ])),
    }
}
