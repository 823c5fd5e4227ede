//! Handler parameters and cache keys

use std::collections::BTreeMap;

use super::kind::HandlerKind;
use crate::context::{redact_account_id, ContextField, ContextSnapshot};
use crate::error::{TriageError, TriageResult};

/// Context values a handler kind is built from
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HandlerParams {
    kind: HandlerKind,
    values: BTreeMap<ContextField, String>,
}

impl HandlerParams {
    /// Pick the relevant fields out of `snapshot`
    ///
    /// Fails with `MissingParameter` naming the first absent required field.
    pub fn from_snapshot(kind: HandlerKind, snapshot: &ContextSnapshot) -> TriageResult<Self> {
        if let Some(field) = kind
            .required_fields()
            .iter()
            .copied()
            .find(|f| !snapshot.has(*f))
        {
            return Err(TriageError::MissingParameter { kind, field });
        }
        let values = kind
            .relevant_fields()
            .filter_map(|f| snapshot.get(f).map(|v| (f, v.to_string())))
            .collect();
        Ok(Self { kind, values })
    }

    pub fn kind(&self) -> HandlerKind {
        self.kind
    }

    pub fn get(&self, field: ContextField) -> Option<&str> {
        self.values.get(&field).map(|s| s.as_str())
    }

    /// A required field; present by construction for required fields
    pub fn require(&self, field: ContextField) -> TriageResult<&str> {
        self.get(field).ok_or(TriageError::MissingParameter {
            kind: self.kind,
            field,
        })
    }

    pub fn cache_key(&self) -> HandlerCacheKey {
        HandlerCacheKey {
            kind: self.kind,
            fields: self.values.iter().map(|(f, v)| (*f, v.clone())).collect(),
        }
    }

    /// `kind=... field=value` with the account id masked, for logs and error detail
    pub fn redacted(&self) -> String {
        let mut parts = vec![format!("kind={}", self.kind)];
        for (field, value) in &self.values {
            let shown = match field {
                ContextField::AccountId => redact_account_id(value),
                _ => value.clone(),
            };
            parts.push(format!("{}={}", field, shown));
        }
        parts.join(" ")
    }
}

/// Kind plus the sorted (field, value) pairs it was built from
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct HandlerCacheKey {
    pub kind: HandlerKind,
    pub fields: Vec<(ContextField, String)>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snapshot(pairs: &[(ContextField, &str)]) -> ContextSnapshot {
        ContextSnapshot::new(pairs.iter().map(|(f, v)| (*f, v.to_string())).collect())
    }

    #[test]
    fn test_missing_required_field() {
        let snap = snapshot(&[(ContextField::AccountId, "sub-1")]);
        match HandlerParams::from_snapshot(HandlerKind::KeyVault, &snap) {
            Err(TriageError::MissingParameter { kind, field }) => {
                assert_eq!(kind, HandlerKind::KeyVault);
                assert_eq!(field, ContextField::GroupName);
            }
            other => panic!("expected MissingParameter, got {:?}", other),
        }
    }

    #[test]
    fn test_key_ignores_irrelevant_fields() {
        let a = snapshot(&[
            (ContextField::AccountId, "sub-1"),
            (ContextField::GroupName, "rg"),
            (ContextField::Intent, "list groups"),
        ]);
        let b = snapshot(&[(ContextField::AccountId, "sub-1"), (ContextField::ResourceName, "kv")]);
        let ka = HandlerParams::from_snapshot(HandlerKind::ResourceGroups, &a).unwrap().cache_key();
        let kb = HandlerParams::from_snapshot(HandlerKind::ResourceGroups, &b).unwrap().cache_key();
        assert_eq!(ka, kb);
        assert_eq!(ka.fields, vec![(ContextField::AccountId, "sub-1".to_string())]);
    }

    #[test]
    fn test_optional_field_changes_key() {
        let without = snapshot(&[(ContextField::AccountId, "sub-1")]);
        let with = snapshot(&[(ContextField::AccountId, "sub-1"), (ContextField::GroupName, "rg")]);
        let k1 = HandlerParams::from_snapshot(HandlerKind::Resources, &without).unwrap().cache_key();
        let k2 = HandlerParams::from_snapshot(HandlerKind::Resources, &with).unwrap().cache_key();
        assert_ne!(k1, k2);
    }

    #[test]
    fn test_redacted_masks_account() {
        let snap = snapshot(&[(ContextField::AccountId, "0000-1111-2222-3333"), (ContextField::GroupName, "rg")]);
        let params = HandlerParams::from_snapshot(HandlerKind::Locks, &snap).unwrap();
        assert_eq!(params.redacted(), "kind=locks account_id=****3333 group_name=rg");
    }
}
