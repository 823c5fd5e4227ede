//! Chained secret store with fallback behavior

use std::sync::Arc;

use super::traits::{SecretInfo, SecretStore, SecretStoreError, SecretStoreResult};

/// Stores tried in order for reads; writes go to one designated store
pub struct ChainSecretStore {
    stores: Vec<Arc<dyn SecretStore>>,
    write_store_index: usize,
}

impl ChainSecretStore {
    /// Chain `stores`, writing to the first one
    pub fn new(stores: Vec<Arc<dyn SecretStore>>) -> SecretStoreResult<Self> {
        Self::with_write_store(stores, 0)
    }

    /// Chain `stores`, writing to `stores[write_store_index]`
    pub fn with_write_store(
        stores: Vec<Arc<dyn SecretStore>>,
        write_store_index: usize,
    ) -> SecretStoreResult<Self> {
        if stores.is_empty() {
            return Err(SecretStoreError::InvalidConfig(
                "chain requires at least one store".to_string(),
            ));
        }
        if write_store_index >= stores.len() {
            return Err(SecretStoreError::InvalidConfig(format!(
                "write store index {} out of bounds for {} stores",
                write_store_index,
                stores.len()
            )));
        }
        Ok(Self {
            stores,
            write_store_index,
        })
    }

    pub fn stores(&self) -> &[Arc<dyn SecretStore>] {
        &self.stores
    }

    /// First available store holding `key`
    pub fn find_store(&self, key: &str) -> Option<&Arc<dyn SecretStore>> {
        self.stores
            .iter()
            .find(|s| s.is_available() && s.has(key))
    }
}

impl SecretStore for ChainSecretStore {
    fn name(&self) -> &str {
        "chain"
    }

    fn is_available(&self) -> bool {
        self.stores.iter().any(|s| s.is_available())
    }

    fn get(&self, key: &str) -> Option<String> {
        self.stores
            .iter()
            .filter(|s| s.is_available())
            .find_map(|s| s.get(key))
    }

    fn store(&self, key: &str, value: &str) -> SecretStoreResult<()> {
        self.stores[self.write_store_index].store(key, value)
    }

    fn delete(&self, key: &str) -> SecretStoreResult<()> {
        // read-only members keep their copy
        for store in &self.stores {
            if store.has(key) {
                let _ = store.delete(key);
            }
        }
        Ok(())
    }

    fn get_info(&self, key: &str) -> SecretInfo {
        match self.find_store(key) {
            Some(store) => SecretInfo::new(true, store.name()),
            None => SecretInfo::not_found(),
        }
    }
}

impl std::fmt::Debug for ChainSecretStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let names: Vec<&str> = self.stores.iter().map(|s| s.name()).collect();
        f.debug_struct("ChainSecretStore")
            .field("stores", &names)
            .field("write_store_index", &self.write_store_index)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::secrets::{EnvSecretStore, MemorySecretStore};

    #[test]
    fn test_chain_store_priority_and_fallback() {
        let first = Arc::new(MemorySecretStore::new());
        let second = Arc::new(MemorySecretStore::new());
        second.store("client_id", "from-second").unwrap();

        let chain = ChainSecretStore::new(vec![first.clone(), second.clone()]).unwrap();
        assert_eq!(chain.get("client_id"), Some("from-second".to_string()));

        first.store("client_id", "from-first").unwrap();
        assert_eq!(chain.get("client_id"), Some("from-first".to_string()));
    }

    #[test]
    fn test_chain_store_writes_to_designated_store() {
        let env: Arc<dyn SecretStore> = Arc::new(EnvSecretStore::new());
        let memory = Arc::new(MemorySecretStore::new());
        let chain = ChainSecretStore::with_write_store(vec![env, memory.clone()], 1).unwrap();

        chain.store("client_secret", "value").unwrap();
        assert_eq!(memory.get("client_secret"), Some("value".to_string()));
        assert_eq!(chain.get_info("client_secret").source, "memory");
    }

    #[test]
    fn test_chain_store_delete_skips_read_only() {
        let memory = Arc::new(MemorySecretStore::new());
        memory.store("tenant_id", "t").unwrap();
        let env: Arc<dyn SecretStore> = Arc::new(EnvSecretStore::new());
        let chain = ChainSecretStore::new(vec![memory.clone(), env]).unwrap();

        chain.delete("tenant_id").unwrap();
        assert!(!memory.has("tenant_id"));
    }

    #[test]
    fn test_chain_store_rejects_bad_configuration() {
        assert!(matches!(
            ChainSecretStore::new(vec![]),
            Err(SecretStoreError::InvalidConfig(_))
        ));
        let store: Arc<dyn SecretStore> = Arc::new(MemorySecretStore::new());
        assert!(ChainSecretStore::with_write_store(vec![store], 3).is_err());
    }
}
