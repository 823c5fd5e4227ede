//! In-memory secret store

use std::collections::HashMap;

use parking_lot::RwLock;

use super::traits::{SecretStore, SecretStoreResult};

/// Read-write store kept in process memory, used by tests and for
/// secrets injected at startup
#[derive(Debug, Default)]
pub struct MemorySecretStore {
    secrets: RwLock<HashMap<String, String>>,
}

impl MemorySecretStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_secrets<K, V>(initial: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            secrets: RwLock::new(
                initial.into_iter().map(|(k, v)| (k.into(), v.into())).collect(),
            ),
        }
    }

    pub fn clear(&self) {
        self.secrets.write().clear();
    }

    pub fn len(&self) -> usize {
        self.secrets.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl SecretStore for MemorySecretStore {
    fn name(&self) -> &str {
        "memory"
    }

    fn get(&self, key: &str) -> Option<String> {
        self.secrets.read().get(key).cloned()
    }

    fn store(&self, key: &str, value: &str) -> SecretStoreResult<()> {
        self.secrets.write().insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn delete(&self, key: &str) -> SecretStoreResult<()> {
        self.secrets.write().remove(key);
        Ok(())
    }
}
