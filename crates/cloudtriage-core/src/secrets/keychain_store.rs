//! System keychain secret store
//!
//! - macOS: Keychain
//! - Windows: Credential Manager
//! - Linux: Secret Service (GNOME Keyring, KWallet)

use keyring::Entry;

use super::traits::{SecretInfo, SecretStore, SecretStoreError, SecretStoreResult};
use crate::logging::file_logger as log;

const COMPONENT: &str = "KeychainSecretStore";

/// Secret store backed by the OS keychain, namespaced by service name
pub struct KeychainSecretStore {
    service_name: String,
}

impl KeychainSecretStore {
    /// Keychain store under the `cloudtriage` service
    pub fn new() -> Self {
        Self::with_service("cloudtriage")
    }

    pub fn with_service(service: impl Into<String>) -> Self {
        Self {
            service_name: service.into(),
        }
    }

    pub fn service_name(&self) -> &str {
        &self.service_name
    }

    fn entry(&self, key: &str) -> SecretStoreResult<Entry> {
        Entry::new(&self.service_name, key)
            .map_err(|e| SecretStoreError::Other(format!("keychain entry for '{}': {}", key, e)))
    }
}

impl Default for KeychainSecretStore {
    fn default() -> Self {
        Self::new()
    }
}

impl SecretStore for KeychainSecretStore {
    fn name(&self) -> &str {
        "keychain"
    }

    fn is_available(&self) -> bool {
        match Entry::new(&self.service_name, "__cloudtriage_availability_check__") {
            Ok(_) => true,
            Err(e) => {
                log::warn(COMPONENT, &format!("keychain unavailable: {}", e));
                false
            }
        }
    }

    fn get(&self, key: &str) -> Option<String> {
        let entry = match self.entry(key) {
            Ok(entry) => entry,
            Err(e) => {
                log::error(COMPONENT, &e.to_string());
                return None;
            }
        };
        match entry.get_password() {
            Ok(password) => Some(password),
            Err(keyring::Error::NoEntry) => None,
            Err(e) => {
                log::warn(COMPONENT, &format!("get('{}') failed: {}", key, e));
                None
            }
        }
    }

    fn store(&self, key: &str, value: &str) -> SecretStoreResult<()> {
        log::info(COMPONENT, &format!("storing '{}' under service '{}'", key, self.service_name));
        self.entry(key)?
            .set_password(value)
            .map_err(|e| SecretStoreError::Other(format!("failed to store in keychain: {}", e)))?;

        // read back through a fresh entry so a cached handle can't mask a failed write
        match self.entry(key)?.get_password() {
            Ok(stored) if stored == value => Ok(()),
            Ok(_) => Err(SecretStoreError::Other(
                "keychain verification failed: value mismatch".to_string(),
            )),
            Err(e) => Err(SecretStoreError::Other(format!(
                "keychain verification failed: {}",
                e
            ))),
        }
    }

    fn delete(&self, key: &str) -> SecretStoreResult<()> {
        match self.entry(key)?.delete_credential() {
            Ok(()) | Err(keyring::Error::NoEntry) => Ok(()),
            Err(e) => Err(SecretStoreError::Other(format!("failed to delete from keychain: {}", e))),
        }
    }

    fn get_info(&self, key: &str) -> SecretInfo {
        SecretInfo::new(self.has(key), self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    #[ignore] // Requires system keychain
    fn test_store_and_get() {
        let store = KeychainSecretStore::with_service("cloudtriage-test");
        let _ = store.delete("client_secret");

        store.store("client_secret", "value").unwrap();
        assert_eq!(store.get("client_secret"), Some("value".to_string()));

        store.delete("client_secret").unwrap();
        assert_eq!(store.get("client_secret"), None);
    }

    #[test]
    fn test_default_service_name() {
        let store = KeychainSecretStore::default();
        assert_eq!(store.name(), "keychain");
        assert_eq!(store.service_name(), "cloudtriage");
    }
}
