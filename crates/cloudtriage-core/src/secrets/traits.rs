//! Core traits and types for secret storage

use thiserror::Error;

/// Information about a secret
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SecretInfo {
    /// Whether the secret exists
    pub available: bool,
    /// Which store provided the secret
    pub source: String,
}

impl SecretInfo {
    pub fn new(available: bool, source: impl Into<String>) -> Self {
        Self {
            available,
            source: source.into(),
        }
    }

    pub fn not_found() -> Self {
        Self::new(false, "none")
    }
}

/// Errors that can occur during secret store operations
#[derive(Error, Debug)]
pub enum SecretStoreError {
    #[error("Store is read-only")]
    ReadOnly,

    #[error("Secret not found: {0}")]
    NotFound(String),

    #[error("Store not available: {0}")]
    NotAvailable(String),

    #[error("Invalid store configuration: {0}")]
    InvalidConfig(String),

    #[error("Store error: {0}")]
    Other(String),
}

pub type SecretStoreResult<T> = Result<T, SecretStoreError>;

/// Trait for secret storage implementations
///
/// Keys are logical names (`client_secret`, `tenant_id`, `azure_openai`)
/// or raw environment variable names. Values are never logged.
pub trait SecretStore: Send + Sync {
    /// Human-readable name of this store
    fn name(&self) -> &str;

    /// Whether the backing service is reachable (a keychain may not be on a headless host)
    fn is_available(&self) -> bool {
        true
    }

    /// Retrieve a secret by key
    fn get(&self, key: &str) -> Option<String>;

    /// Store a secret; read-only stores return `ReadOnly`
    fn store(&self, key: &str, value: &str) -> SecretStoreResult<()>;

    /// Delete a secret; read-only stores return `ReadOnly`
    fn delete(&self, key: &str) -> SecretStoreResult<()>;

    fn has(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    fn get_info(&self, key: &str) -> SecretInfo {
        SecretInfo::new(self.has(key), self.name())
    }

    /// Retrieve a secret or fail with `NotFound`
    fn require(&self, key: &str) -> SecretStoreResult<String> {
        self.get(key)
            .ok_or_else(|| SecretStoreError::NotFound(key.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_secret_info() {
        let info = SecretInfo::new(true, "test");
        assert!(info.available);
        assert_eq!(info.source, "test");

        let not_found = SecretInfo::not_found();
        assert!(!not_found.available);
        assert_eq!(not_found.source, "none");
    }
}
