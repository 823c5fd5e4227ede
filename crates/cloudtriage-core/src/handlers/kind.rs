//! Closed set of handler kinds

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::context::ContextField;
use crate::error::TriageError;

/// Service handles the factory can build
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HandlerKind {
    Subscriptions,
    ResourceGroups,
    Resources,
    AdfLinkedServices,
    AdfTriggers,
    AdfPipelines,
    AdfIntegrationRuntime,
    AdfManagedPrivateEndpoint,
    BatchPool,
    KeyVault,
    Locks,
}

use ContextField::{AccountId, GroupName, PoolName, ResourceName};

const NONE: &[ContextField] = &[];
const ACCOUNT: &[ContextField] = &[AccountId];
const GROUP: &[ContextField] = &[AccountId, GroupName];
const RESOURCE: &[ContextField] = &[AccountId, GroupName, ResourceName];
const POOL: &[ContextField] = &[AccountId, GroupName, ResourceName, PoolName];
const SCOPE_GROUP: &[ContextField] = &[GroupName];

impl HandlerKind {
    pub const ALL: [HandlerKind; 11] = [
        HandlerKind::Subscriptions,
        HandlerKind::ResourceGroups,
        HandlerKind::Resources,
        HandlerKind::AdfLinkedServices,
        HandlerKind::AdfTriggers,
        HandlerKind::AdfPipelines,
        HandlerKind::AdfIntegrationRuntime,
        HandlerKind::AdfManagedPrivateEndpoint,
        HandlerKind::BatchPool,
        HandlerKind::KeyVault,
        HandlerKind::Locks,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            HandlerKind::Subscriptions => "subscriptions",
            HandlerKind::ResourceGroups => "resource_groups",
            HandlerKind::Resources => "resources",
            HandlerKind::AdfLinkedServices => "adf_linked_services",
            HandlerKind::AdfTriggers => "adf_triggers",
            HandlerKind::AdfPipelines => "adf_pipelines",
            HandlerKind::AdfIntegrationRuntime => "adf_integration_runtime",
            HandlerKind::AdfManagedPrivateEndpoint => "adf_managed_private_endpoint",
            HandlerKind::BatchPool => "batch_pool",
            HandlerKind::KeyVault => "key_vault",
            HandlerKind::Locks => "locks",
        }
    }

    /// Operator-facing name
    pub fn label(&self) -> &'static str {
        match self {
            HandlerKind::Subscriptions => "subscriptions",
            HandlerKind::ResourceGroups => "resource groups",
            HandlerKind::Resources => "resources",
            HandlerKind::AdfLinkedServices => "data factory linked services",
            HandlerKind::AdfTriggers => "data factory triggers",
            HandlerKind::AdfPipelines => "data factory pipelines",
            HandlerKind::AdfIntegrationRuntime => "data factory integration runtimes",
            HandlerKind::AdfManagedPrivateEndpoint => "data factory managed private endpoints",
            HandlerKind::BatchPool => "batch pools",
            HandlerKind::KeyVault => "key vault secrets",
            HandlerKind::Locks => "resource locks",
        }
    }

    /// Fields that must be set before a handle can be built
    pub fn required_fields(&self) -> &'static [ContextField] {
        match self {
            HandlerKind::Subscriptions => NONE,
            HandlerKind::ResourceGroups | HandlerKind::Resources => ACCOUNT,
            HandlerKind::Locks => GROUP,
            HandlerKind::AdfLinkedServices
            | HandlerKind::AdfTriggers
            | HandlerKind::AdfPipelines
            | HandlerKind::AdfIntegrationRuntime
            | HandlerKind::AdfManagedPrivateEndpoint
            | HandlerKind::KeyVault => RESOURCE,
            HandlerKind::BatchPool => POOL,
        }
    }

    /// Fields used when present
    pub fn optional_fields(&self) -> &'static [ContextField] {
        match self {
            HandlerKind::Resources => SCOPE_GROUP,
            _ => NONE,
        }
    }

    /// Required then optional fields; these make up the cache key
    pub fn relevant_fields(&self) -> impl Iterator<Item = ContextField> {
        self.required_fields()
            .iter()
            .chain(self.optional_fields())
            .copied()
    }
}

impl fmt::Display for HandlerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for HandlerKind {
    type Err = TriageError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_lowercase().replace(['-', ' '], "_");
        HandlerKind::ALL
            .iter()
            .copied()
            .find(|k| k.as_str() == normalized)
            .ok_or_else(|| TriageError::UnknownHandlerKind(s.trim().to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_known_and_unknown() {
        assert_eq!("adf_pipelines".parse::<HandlerKind>().unwrap(), HandlerKind::AdfPipelines);
        assert_eq!("Key-Vault".parse::<HandlerKind>().unwrap(), HandlerKind::KeyVault);
        match "cosmos_db".parse::<HandlerKind>() {
            Err(TriageError::UnknownHandlerKind(name)) => assert_eq!(name, "cosmos_db"),
            other => panic!("expected UnknownHandlerKind, got {:?}", other),
        }
    }

    #[test]
    fn test_field_requirements() {
        assert!(HandlerKind::Subscriptions.required_fields().is_empty());
        assert_eq!(HandlerKind::Resources.required_fields(), &[AccountId]);
        assert_eq!(HandlerKind::Resources.optional_fields(), &[GroupName]);
        assert!(HandlerKind::BatchPool.required_fields().contains(&PoolName));
        assert_eq!(HandlerKind::Locks.required_fields(), &[AccountId, GroupName]);
        let relevant: Vec<_> = HandlerKind::Resources.relevant_fields().collect();
        assert_eq!(relevant, vec![AccountId, GroupName]);
    }
}
