//! Settings schema

use std::collections::BTreeMap;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::traits::{ConfigError, ConfigResult};
use crate::guardrail::GuardrailPhrases;

/// Effective configuration for one orchestrator
///
/// ```yaml
/// auth:
///   method: default
///   tenant_id: 00000000-0000-0000-0000-000000000000
/// model:
///   endpoint: https://my-openai.openai.azure.com
///   deployment: gpt-4o-mini
/// handler_cache:
///   capacity: 64
///   ttl_secs: 3600
/// subscriptions:
///   EDW: 11111111-2222-3333-4444-555555555555
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub auth: AuthSettings,
    pub model: ModelSettings,
    pub timeouts: TimeoutSettings,
    pub handler_cache: HandlerCacheSettings,
    pub guardrail: GuardrailPhrases,
    /// Named subscription aliases (display name → subscription id)
    pub subscriptions: BTreeMap<String, String>,
    pub mcp: McpSettings,
}

impl Settings {
    /// Reject values that would make the orchestrator unusable
    pub fn validate(&self) -> ConfigResult<()> {
        if self.handler_cache.capacity == 0 {
            return Err(invalid("handler_cache.capacity", "must be at least 1"));
        }
        if self.handler_cache.ttl_secs == 0 {
            return Err(invalid("handler_cache.ttl_secs", "must be at least 1"));
        }
        for (key, secs) in self.timeouts.entries() {
            if secs == 0 {
                return Err(invalid(&format!("timeouts.{}", key), "must be at least 1 second"));
            }
        }
        if self.timeouts.verification_secs <= 2 * self.timeouts.handler_build_secs {
            return Err(invalid(
                "timeouts.verification_secs",
                "must exceed twice timeouts.handler_build_secs",
            ));
        }
        if self.auth.method == AuthMethod::ClientSecret && self.auth.tenant_id.is_none() {
            return Err(invalid("auth.tenant_id", "required for client_secret authentication"));
        }
        Ok(())
    }

    /// Resolve a subscription alias (case-insensitive) to its id
    pub fn subscription_alias(&self, name: &str) -> Option<&str> {
        self.subscriptions
            .iter()
            .find(|(alias, _)| alias.eq_ignore_ascii_case(name.trim()))
            .map(|(_, id)| id.as_str())
    }
}

fn invalid(key: &str, message: &str) -> ConfigError {
    ConfigError::Invalid {
        key: key.to_string(),
        message: message.to_string(),
    }
}

/// How the management-plane token is acquired
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuthMethod {
    /// Client secret when one is stored, then the Azure CLI
    #[default]
    Default,
    /// `az account get-access-token`
    Cli,
    /// OAuth2 client-credentials grant
    ClientSecret,
}

impl FromStr for AuthMethod {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().replace('-', "_").as_str() {
            "default" => Ok(AuthMethod::Default),
            "cli" | "azure_cli" => Ok(AuthMethod::Cli),
            "client_secret" => Ok(AuthMethod::ClientSecret),
            other => Err(invalid("auth.method", &format!("unknown method '{}'", other))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthSettings {
    pub method: AuthMethod,
    pub tenant_id: Option<String>,
    pub client_id: Option<String>,
    /// Token scope requested from the authority
    pub scope: String,
    pub authority: String,
    /// Secret store name passed to `create_secret_store`
    pub secret_store: String,
}

impl Default for AuthSettings {
    fn default() -> Self {
        Self {
            method: AuthMethod::Default,
            tenant_id: None,
            client_id: None,
            scope: "https://management.azure.com/.default".to_string(),
            authority: "https://login.microsoftonline.com".to_string(),
            secret_store: "default".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelSettings {
    /// Azure OpenAI resource endpoint; `None` uses the public OpenAI API
    pub endpoint: Option<String>,
    pub deployment: String,
    pub api_version: String,
    /// Secret key holding the model API key
    pub api_key_secret: String,
}

impl Default for ModelSettings {
    fn default() -> Self {
        Self {
            endpoint: None,
            deployment: "gpt-4o-mini".to_string(),
            api_version: "2024-10-21".to_string(),
            api_key_secret: "azure_openai".to_string(),
        }
    }
}

/// Upper bounds for every remote boundary, in seconds
///
/// Bounds nest: a guardrail verification may build a handler (retried once
/// on timeout) and then list through it, so `verification_secs` has to
/// exceed twice `handler_build_secs`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TimeoutSettings {
    pub credential_secs: u64,
    pub handler_build_secs: u64,
    /// One Resource Manager request
    pub request_secs: u64,
    pub verification_secs: u64,
    pub tool_catalog_secs: u64,
    pub model_secs: u64,
}

impl Default for TimeoutSettings {
    fn default() -> Self {
        Self {
            credential_secs: 30,
            handler_build_secs: 30,
            request_secs: 30,
            verification_secs: 90,
            tool_catalog_secs: 240,
            model_secs: 120,
        }
    }
}

impl TimeoutSettings {
    pub fn credential(&self) -> Duration {
        Duration::from_secs(self.credential_secs)
    }

    pub fn handler_build(&self) -> Duration {
        Duration::from_secs(self.handler_build_secs)
    }

    pub fn request(&self) -> Duration {
        Duration::from_secs(self.request_secs)
    }

    pub fn verification(&self) -> Duration {
        Duration::from_secs(self.verification_secs)
    }

    pub fn tool_catalog(&self) -> Duration {
        Duration::from_secs(self.tool_catalog_secs)
    }

    pub fn model(&self) -> Duration {
        Duration::from_secs(self.model_secs)
    }

    fn entries(&self) -> [(&'static str, u64); 6] {
        [
            ("credential_secs", self.credential_secs),
            ("handler_build_secs", self.handler_build_secs),
            ("request_secs", self.request_secs),
            ("verification_secs", self.verification_secs),
            ("tool_catalog_secs", self.tool_catalog_secs),
            ("model_secs", self.model_secs),
        ]
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HandlerCacheSettings {
    pub capacity: usize,
    /// Matches the lifetime of a management-plane token
    pub ttl_secs: u64,
}

impl Default for HandlerCacheSettings {
    fn default() -> Self {
        Self {
            capacity: 64,
            ttl_secs: 3600,
        }
    }
}

impl HandlerCacheSettings {
    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_secs)
    }
}

/// MCP-backed specialist
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct McpSettings {
    pub enabled: bool,
    pub command: String,
    pub args: Vec<String>,
    /// Streamable HTTP endpoint; takes precedence over `command`
    pub url: Option<String>,
    /// Exact tool names
    pub allow_tools: Vec<String>,
    pub allow_prefixes: Vec<String>,
    /// Substrings matched anywhere in the tool name
    pub allow_patterns: Vec<String>,
}

impl Default for McpSettings {
    fn default() -> Self {
        Self {
            enabled: false,
            command: "npx".to_string(),
            args: ["-y", "@azure/mcp@latest", "server", "start"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
            url: None,
            allow_tools: vec!["storage".to_string(), "kusto".to_string()],
            allow_prefixes: Vec::new(),
            allow_patterns: vec!["-storage-".to_string()],
        }
    }
}

/// Environment variables that override file settings
pub const ENV_OVERRIDES: &[&str] = &[
    "AZURE_TENANT_ID",
    "AZURE_CLIENT_ID",
    "AZURE_OPENAI_ENDPOINT",
    "AZURE_OPENAI_DEPLOYMENT",
    "CLOUDTRIAGE_AUTH_METHOD",
];

/// Apply environment overrides through `lookup` (usually `std::env::var`)
///
/// Empty values are ignored.
pub fn apply_env_overrides<F>(settings: &mut Settings, lookup: F) -> ConfigResult<()>
where
    F: Fn(&str) -> Option<String>,
{
    let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

    if let Some(v) = get("AZURE_TENANT_ID") {
        settings.auth.tenant_id = Some(v);
    }
    if let Some(v) = get("AZURE_CLIENT_ID") {
        settings.auth.client_id = Some(v);
    }
    if let Some(v) = get("AZURE_OPENAI_ENDPOINT") {
        settings.model.endpoint = Some(v);
    }
    if let Some(v) = get("AZURE_OPENAI_DEPLOYMENT") {
        settings.model.deployment = v;
    }
    if let Some(v) = get("CLOUDTRIAGE_AUTH_METHOD") {
        settings.auth.method = v.parse()?;
    }
    Ok(())
}
