//! Specialist kinds

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::TriageError;
use crate::handlers::HandlerKind;

/// The fixed set of specialists the router can hand off to
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SpecialistKind {
    AdfLinkedServices,
    AdfIntegrationRuntime,
    AdfPipelines,
    KeyVault,
    BatchPool,
    Locks,
    /// Generic specialist backed by the Azure MCP server
    AzureMcp,
}

impl SpecialistKind {
    pub const ALL: [SpecialistKind; 7] = [
        SpecialistKind::AdfLinkedServices,
        SpecialistKind::AdfIntegrationRuntime,
        SpecialistKind::AdfPipelines,
        SpecialistKind::KeyVault,
        SpecialistKind::BatchPool,
        SpecialistKind::Locks,
        SpecialistKind::AzureMcp,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            SpecialistKind::AdfLinkedServices => "adf_linked_services",
            SpecialistKind::AdfIntegrationRuntime => "adf_integration_runtime",
            SpecialistKind::AdfPipelines => "adf_pipelines",
            SpecialistKind::KeyVault => "key_vault",
            SpecialistKind::BatchPool => "batch_pool",
            SpecialistKind::Locks => "locks",
            SpecialistKind::AzureMcp => "azure_mcp",
        }
    }

    /// What the specialist handles, shown to the routing model
    pub fn description(&self) -> &'static str {
        match self {
            SpecialistKind::AdfLinkedServices => {
                "Azure Data Factory linked services: list, inspect, update and test connections"
            }
            SpecialistKind::AdfIntegrationRuntime => {
                "Azure Data Factory integration runtimes and managed private endpoints"
            }
            SpecialistKind::AdfPipelines => "Azure Data Factory pipelines and triggers",
            SpecialistKind::KeyVault => "Azure Key Vault secrets",
            SpecialistKind::BatchPool => "Azure Batch pools",
            SpecialistKind::Locks => "Resource locks on a resource group",
            SpecialistKind::AzureMcp => "Storage accounts, blobs, tables and Kusto through the Azure MCP server",
        }
    }

    /// Handler kinds whose operations the specialist exposes
    pub fn handler_kinds(&self) -> &'static [HandlerKind] {
        match self {
            SpecialistKind::AdfLinkedServices => &[HandlerKind::AdfLinkedServices],
            SpecialistKind::AdfIntegrationRuntime => &[
                HandlerKind::AdfIntegrationRuntime,
                HandlerKind::AdfManagedPrivateEndpoint,
            ],
            SpecialistKind::AdfPipelines => &[HandlerKind::AdfPipelines, HandlerKind::AdfTriggers],
            SpecialistKind::KeyVault => &[HandlerKind::KeyVault],
            SpecialistKind::BatchPool => &[HandlerKind::BatchPool],
            SpecialistKind::Locks => &[HandlerKind::Locks],
            SpecialistKind::AzureMcp => &[],
        }
    }

    /// Name of the routing tool that hands off to this specialist
    pub fn transfer_tool(&self) -> String {
        format!("transfer_to_{}", self.as_str())
    }

    pub fn from_transfer_tool(name: &str) -> Option<Self> {
        let kind = name.strip_prefix("transfer_to_")?;
        kind.parse().ok()
    }
}

impl fmt::Display for SpecialistKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SpecialistKind {
    type Err = TriageError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_lowercase().replace(['-', ' '], "_");
        SpecialistKind::ALL
            .iter()
            .copied()
            .find(|k| k.as_str() == normalized)
            .ok_or_else(|| TriageError::UnknownSpecialist(s.trim().to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transfer_tool_round_trip() {
        for kind in SpecialistKind::ALL {
            assert_eq!(SpecialistKind::from_transfer_tool(&kind.transfer_tool()), Some(kind));
        }
        assert_eq!(SpecialistKind::from_transfer_tool("transfer_to_nowhere"), None);
        assert_eq!(SpecialistKind::from_transfer_tool("key_vault"), None);
    }

    #[test]
    fn test_parse() {
        assert_eq!("Key Vault".parse::<SpecialistKind>().unwrap(), SpecialistKind::KeyVault);
        assert!(matches!(
            "dns".parse::<SpecialistKind>(),
            Err(TriageError::UnknownSpecialist(name)) if name == "dns"
        ));
    }

    #[test]
    fn test_only_mcp_has_no_handlers() {
        for kind in SpecialistKind::ALL {
            assert_eq!(kind.handler_kinds().is_empty(), kind == SpecialistKind::AzureMcp);
        }
    }
}
