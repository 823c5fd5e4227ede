//! Configuration provider trait

use async_trait::async_trait;

use super::settings::Settings;

/// Source of `Settings`
///
/// Implementations:
/// - `FileConfigProvider`: one YAML file
/// - `LayeredConfigProvider`: user + workspace files with env overrides
/// - `MemoryConfigProvider`: in-memory for testing
#[async_trait]
pub trait ConfigProvider: Send + Sync {
    /// Load the effective settings
    async fn load(&self) -> ConfigResult<Settings>;

    /// Persist settings; read-only providers return `ConfigError::ReadOnly`
    async fn save(&self, settings: &Settings) -> ConfigResult<()>;
}

/// Errors that can occur during configuration operations
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse YAML: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("Invalid setting '{key}': {message}")]
    Invalid { key: String, message: String },

    #[error("Configuration is read-only")]
    ReadOnly,
}

pub type ConfigResult<T> = Result<T, ConfigError>;
