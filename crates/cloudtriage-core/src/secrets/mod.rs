//! Secret storage for credentials and model API keys
//!
//! `ClientSecretCredential` reads the tenant id, client id and client
//! secret through a `SecretStore`; `GenaiModel` reads the model API key the
//! same way. Stores are chained so a keychain entry can shadow the
//! environment.

mod traits;
mod env_store;
mod memory_store;
mod chain_store;
mod keychain_store;

use std::sync::Arc;

pub use traits::{SecretStore, SecretInfo, SecretStoreError, SecretStoreResult};
pub use env_store::EnvSecretStore;
pub use memory_store::MemorySecretStore;
pub use chain_store::ChainSecretStore;
pub use keychain_store::KeychainSecretStore;

/// Names accepted by `create_secret_store`
pub const SECRET_STORE_NAMES: &[&str] = &["env", "memory", "keychain", "default"];

/// Create a store by name
///
/// `default` is the keychain (when reachable) followed by the environment.
pub fn create_secret_store(name: &str) -> SecretStoreResult<Arc<dyn SecretStore>> {
    match name.trim().to_lowercase().as_str() {
        "env" => Ok(Arc::new(EnvSecretStore::new())),
        "memory" => Ok(Arc::new(MemorySecretStore::new())),
        "keychain" => Ok(Arc::new(KeychainSecretStore::new())),
        "default" => {
            let keychain: Arc<dyn SecretStore> = Arc::new(KeychainSecretStore::new());
            let env: Arc<dyn SecretStore> = Arc::new(EnvSecretStore::new());
            Ok(Arc::new(ChainSecretStore::new(vec![keychain, env])?))
        }
        other => Err(SecretStoreError::NotAvailable(format!(
            "unknown secret store '{}' (expected one of: {})",
            other,
            SECRET_STORE_NAMES.join(", ")
        ))),
    }
}
