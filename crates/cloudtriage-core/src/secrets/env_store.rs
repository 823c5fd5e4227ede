//! Environment variable secret store

use std::collections::HashMap;
use std::env;

use once_cell::sync::Lazy;

use super::traits::{SecretStore, SecretInfo, SecretStoreError, SecretStoreResult};

/// Logical secret names and the environment variables that back them
static ENV_VAR_MAP: Lazy<HashMap<&'static str, Vec<&'static str>>> = Lazy::new(|| {
    let mut m = HashMap::new();
    m.insert("client_secret", vec!["AZURE_CLIENT_SECRET"]);
    m.insert("tenant_id", vec!["AZURE_TENANT_ID"]);
    m.insert("client_id", vec!["AZURE_CLIENT_ID"]);
    m.insert("azure_openai", vec!["AZURE_OPENAI_API_KEY", "OPENAI_API_KEY"]);
    m
});

/// Read-only store over the process environment
///
/// Logical names are mapped first:
/// - `client_secret` → `AZURE_CLIENT_SECRET`
/// - `tenant_id` → `AZURE_TENANT_ID`
/// - `client_id` → `AZURE_CLIENT_ID`
/// - `azure_openai` → `AZURE_OPENAI_API_KEY` or `OPENAI_API_KEY`
///
/// Any other key is looked up verbatim. Empty values count as unset.
#[derive(Debug, Default)]
pub struct EnvSecretStore {
    _private: (),
}

impl EnvSecretStore {
    pub fn new() -> Self {
        Self { _private: () }
    }

    /// Environment variables consulted for a logical name
    pub fn env_vars_for(key: &str) -> Option<&'static [&'static str]> {
        ENV_VAR_MAP.get(key.to_lowercase().as_str()).map(|v| v.as_slice())
    }

    fn non_empty(var: &str) -> Option<String> {
        env::var(var).ok().filter(|v| !v.is_empty())
    }
}

impl SecretStore for EnvSecretStore {
    fn name(&self) -> &str {
        "env"
    }

    fn get(&self, key: &str) -> Option<String> {
        if let Some(vars) = Self::env_vars_for(key) {
            if let Some(value) = vars.iter().find_map(|v| Self::non_empty(v)) {
                return Some(value);
            }
        }
        Self::non_empty(key)
    }

    fn store(&self, _key: &str, _value: &str) -> SecretStoreResult<()> {
        Err(SecretStoreError::ReadOnly)
    }

    fn delete(&self, _key: &str) -> SecretStoreResult<()> {
        Err(SecretStoreError::ReadOnly)
    }

    fn get_info(&self, key: &str) -> SecretInfo {
        if self.has(key) {
            SecretInfo::new(true, self.name())
        } else {
            SecretInfo::not_found()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_env_store_read_only() {
        let store = EnvSecretStore::new();
        assert!(matches!(store.store("x", "y"), Err(SecretStoreError::ReadOnly)));
        assert!(matches!(store.delete("x"), Err(SecretStoreError::ReadOnly)));
    }

    #[test]
    fn test_env_store_get_direct() {
        env::set_var("CLOUDTRIAGE_TEST_SECRET_DIRECT", "direct");
        let store = EnvSecretStore::new();
        assert_eq!(store.get("CLOUDTRIAGE_TEST_SECRET_DIRECT"), Some("direct".to_string()));
        env::remove_var("CLOUDTRIAGE_TEST_SECRET_DIRECT");
    }

    #[test]
    fn test_env_store_maps_logical_names() {
        assert_eq!(EnvSecretStore::env_vars_for("Client_Secret"), Some(&["AZURE_CLIENT_SECRET"][..]));
        assert!(EnvSecretStore::env_vars_for("azure_openai").unwrap().contains(&"OPENAI_API_KEY"));
        assert!(EnvSecretStore::env_vars_for("unknown").is_none());
    }

    #[test]
    fn test_env_store_empty_counts_as_unset() {
        env::set_var("CLOUDTRIAGE_TEST_EMPTY", "");
        let store = EnvSecretStore::new();
        assert!(!store.has("CLOUDTRIAGE_TEST_EMPTY"));
        assert!(!store.get_info("CLOUDTRIAGE_TEST_EMPTY").available);
        env::remove_var("CLOUDTRIAGE_TEST_EMPTY");
    }
}
