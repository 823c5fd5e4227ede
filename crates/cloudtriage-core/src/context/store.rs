//! Shared, mutable request context

use std::collections::btree_map::Entry;
use std::collections::BTreeMap;
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};

use super::field::{ContextField, ContextSnapshot};
use super::update::{ContextReport, ContextUpdate};
use crate::auth::TokenCache;

/// Request context for one conversation
///
/// Each field write takes the lock once, so a cancelled turn never leaves a
/// field half-written.
#[derive(Default)]
pub struct ContextStore {
    fields: RwLock<BTreeMap<ContextField, String>>,
    auth: Mutex<Option<Arc<TokenCache>>>,
}

impl ContextStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Context that already shares `auth`
    pub fn with_auth(auth: Arc<TokenCache>) -> Self {
        let store = Self::new();
        store.attach_auth(auth);
        store
    }

    /// Write `value` only if `field` is empty and `value` is not
    ///
    /// Returns whether a write happened.
    pub fn set_if_absent(&self, field: ContextField, value: impl AsRef<str>) -> bool {
        let value = value.as_ref().trim();
        if value.is_empty() {
            return false;
        }
        match self.fields.write().entry(field) {
            Entry::Vacant(slot) => {
                slot.insert(value.to_string());
                true
            }
            Entry::Occupied(_) => false,
        }
    }

    /// Overwrite `field`, returning the previous value; an empty value clears it
    pub fn replace(&self, field: ContextField, value: impl AsRef<str>) -> Option<String> {
        let value = value.as_ref().trim();
        let mut fields = self.fields.write();
        if value.is_empty() {
            fields.remove(&field)
        } else {
            fields.insert(field, value.to_string())
        }
    }

    pub fn clear(&self, field: ContextField) -> Option<String> {
        self.fields.write().remove(&field)
    }

    pub fn get(&self, field: ContextField) -> Option<String> {
        self.fields.read().get(&field).cloned()
    }

    pub fn has(&self, field: ContextField) -> bool {
        self.fields.read().contains_key(&field)
    }

    pub fn snapshot(&self) -> ContextSnapshot {
        ContextSnapshot::new(self.fields.read().clone())
    }

    /// Share an existing token cache with this context
    pub fn attach_auth(&self, auth: Arc<TokenCache>) {
        *self.auth.lock() = Some(auth);
    }

    pub fn has_auth(&self) -> bool {
        self.auth.lock().is_some()
    }

    /// The attached token cache, creating the default chain on first use
    pub fn ensure_auth(&self) -> Arc<TokenCache> {
        self.auth
            .lock()
            .get_or_insert_with(|| Arc::new(TokenCache::from_default_chain()))
            .clone()
    }

    /// Record the fields in `update` that are still empty and report the result
    pub fn apply(&self, update: &ContextUpdate) -> ContextReport {
        let auth_initialized = !self.has_auth();
        self.ensure_auth();

        let mut report = ContextReport {
            auth_initialized,
            ..ContextReport::default()
        };
        for (field, value) in update.iter() {
            if let Some(existing) = self.get(field) {
                report.already_available.push((field, existing));
            } else if self.set_if_absent(field, value) {
                report.newly_set.push((field, value.trim().to_string()));
            }
        }
        report.missing = ContextReport::TRACKED
            .iter()
            .copied()
            .filter(|f| !self.has(*f))
            .collect();
        report
    }
}

impl std::fmt::Debug for ContextStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ContextStore")
            .field("fields", &self.snapshot().redacted())
            .field("auth", &self.has_auth())
            .finish()
    }
}
