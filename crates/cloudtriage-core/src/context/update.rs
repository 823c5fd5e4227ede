//! The context-setting operation and its report

use std::collections::BTreeMap;

use serde_json::Value;

use super::field::ContextField;

/// Values the operator (or the model on their behalf) supplied this turn
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ContextUpdate {
    values: BTreeMap<ContextField, String>,
}

impl ContextUpdate {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a value; empty values are dropped
    pub fn with(mut self, field: ContextField, value: impl Into<String>) -> Self {
        let value = value.into();
        if !value.trim().is_empty() {
            self.values.insert(field, value);
        }
        self
    }

    /// Build from tool-call arguments such as
    /// `{"subscription_id": "...", "resource_group_name": "..."}`
    ///
    /// Unknown keys and non-string values are ignored.
    pub fn from_arguments(args: &Value) -> Self {
        let mut update = Self::new();
        if let Some(map) = args.as_object() {
            for (key, value) in map {
                if let (Ok(field), Some(text)) = (key.parse::<ContextField>(), value.as_str()) {
                    update = update.with(field, text);
                }
            }
        }
        update
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (ContextField, &str)> {
        self.values.iter().map(|(f, v)| (*f, v.as_str()))
    }
}

/// Outcome of `ContextStore::apply`
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ContextReport {
    /// Fields that were already set; the update's value was not used
    pub already_available: Vec<(ContextField, String)>,
    pub newly_set: Vec<(ContextField, String)>,
    /// Tracked fields that are still empty
    pub missing: Vec<ContextField>,
    /// The context had no credential and one was attached
    pub auth_initialized: bool,
}

impl ContextReport {
    /// Fields reported as missing
    pub const TRACKED: [ContextField; 4] = [
        ContextField::AccountId,
        ContextField::GroupName,
        ContextField::ResourceName,
        ContextField::Intent,
    ];

    /// Status text handed back to the model
    pub fn status_text(&self) -> String {
        let mut lines = vec!["Context update:".to_string()];
        if self.auth_initialized {
            lines.push("Authentication: newly set".to_string());
        }
        if !self.already_available.is_empty() {
            lines.push(format!("Already available: {}", join_pairs(&self.already_available)));
        }
        if !self.newly_set.is_empty() {
            lines.push(format!("Newly set: {}", join_pairs(&self.newly_set)));
        }
        if !self.missing.is_empty() {
            let missing: Vec<&str> = self.missing.iter().map(|f| f.label()).collect();
            lines.push(format!("Still missing: {}", missing.join(", ")));
        }
        lines.join("\n")
    }
}

fn join_pairs(pairs: &[(ContextField, String)]) -> String {
    pairs
        .iter()
        .map(|(field, value)| format!("{}: {}", field.label(), value))
        .collect::<Vec<_>>()
        .join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::{StaticCredential, TokenCache};
    use crate::context::ContextStore;
    use serde_json::json;
    use std::sync::Arc;
    use std::time::Duration;

    fn store() -> ContextStore {
        ContextStore::with_auth(Arc::new(TokenCache::new(
            Arc::new(StaticCredential::new("tok", Duration::from_secs(3600))),
            "scope",
        )))
    }

    #[test]
    fn test_from_arguments_accepts_azure_names() {
        let update = ContextUpdate::from_arguments(&json!({
            "subscription_id": "sub-1",
            "resource_group_name": "rg-1",
            "resource_name": "",
            "unknown": "x",
            "intent": 7,
        }));
        let fields: Vec<ContextField> = update.iter().map(|(f, _)| f).collect();
        assert_eq!(fields, vec![ContextField::AccountId, ContextField::GroupName]);
    }

    #[test]
    fn test_apply_reports_each_bucket() {
        let store = store();
        store.set_if_absent(ContextField::AccountId, "sub-existing");

        let report = store.apply(
            &ContextUpdate::new()
                .with(ContextField::AccountId, "sub-other")
                .with(ContextField::GroupName, "rg-data"),
        );

        assert!(!report.auth_initialized);
        assert_eq!(report.already_available, vec![(ContextField::AccountId, "sub-existing".to_string())]);
        assert_eq!(report.newly_set, vec![(ContextField::GroupName, "rg-data".to_string())]);
        assert_eq!(report.missing, vec![ContextField::ResourceName, ContextField::Intent]);
        assert_eq!(store.get(ContextField::AccountId).as_deref(), Some("sub-existing"));

        let text = report.status_text();
        assert!(text.contains("Already available: subscription ID: sub-existing"));
        assert!(text.contains("Newly set: resource group: rg-data"));
        assert!(text.contains("Still missing: resource name, intent"));
    }

    #[test]
    fn test_apply_attaches_auth() {
        let store = ContextStore::new();
        let report = store.apply(&ContextUpdate::new().with(ContextField::Intent, "list pipelines"));
        assert!(report.auth_initialized);
        assert!(store.has_auth());
        assert!(report.status_text().contains("Authentication: newly set"));
    }
}
