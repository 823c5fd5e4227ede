//! Context fields and read-only snapshots

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Identifying parameters gathered across turns
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContextField {
    /// Subscription id
    AccountId,
    /// Subscription display name
    AccountDisplayName,
    /// Resource group
    GroupName,
    /// Data factory, key vault or batch account name
    ResourceName,
    /// Batch pool inside the batch account
    PoolName,
    /// What the operator wants to do, in plain English
    Intent,
}

impl ContextField {
    pub const ALL: [ContextField; 6] = [
        ContextField::AccountId,
        ContextField::AccountDisplayName,
        ContextField::GroupName,
        ContextField::ResourceName,
        ContextField::PoolName,
        ContextField::Intent,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ContextField::AccountId => "account_id",
            ContextField::AccountDisplayName => "account_display_name",
            ContextField::GroupName => "group_name",
            ContextField::ResourceName => "resource_name",
            ContextField::PoolName => "pool_name",
            ContextField::Intent => "intent",
        }
    }

    /// Operator-facing name
    pub fn label(&self) -> &'static str {
        match self {
            ContextField::AccountId => "subscription ID",
            ContextField::AccountDisplayName => "subscription name",
            ContextField::GroupName => "resource group",
            ContextField::ResourceName => "resource name",
            ContextField::PoolName => "pool name",
            ContextField::Intent => "intent",
        }
    }
}

impl fmt::Display for ContextField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ContextField {
    type Err = String;

    /// Accepts the canonical names plus the Azure spellings models tend to use
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "account_id" | "subscription_id" | "subscription" => Ok(ContextField::AccountId),
            "account_display_name" | "subscription_name" => Ok(ContextField::AccountDisplayName),
            "group_name" | "resource_group_name" | "resource_group" => Ok(ContextField::GroupName),
            "resource_name" | "factory_name" | "vault_name" | "batch_account_name" => {
                Ok(ContextField::ResourceName)
            }
            "pool_name" | "pool_id" => Ok(ContextField::PoolName),
            "intent" => Ok(ContextField::Intent),
            other => Err(format!("unknown context field '{}'", other)),
        }
    }
}

/// Mask all but the last four characters of an account id
pub fn redact_account_id(value: &str) -> String {
    let chars: Vec<char> = value.chars().collect();
    if chars.len() <= 4 {
        return "****".to_string();
    }
    let tail: String = chars[chars.len() - 4..].iter().collect();
    format!("****{}", tail)
}

/// Point-in-time copy of the set fields
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ContextSnapshot {
    fields: BTreeMap<ContextField, String>,
}

impl ContextSnapshot {
    pub fn new(fields: BTreeMap<ContextField, String>) -> Self {
        Self { fields }
    }

    pub fn get(&self, field: ContextField) -> Option<&str> {
        self.fields.get(&field).map(|s| s.as_str())
    }

    pub fn has(&self, field: ContextField) -> bool {
        self.fields.contains_key(&field)
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (ContextField, &str)> {
        self.fields.iter().map(|(f, v)| (*f, v.as_str()))
    }

    /// `field=value` pairs for logs, account id masked
    pub fn redacted(&self) -> String {
        self.fields
            .iter()
            .map(|(field, value)| match field {
                ContextField::AccountId => format!("{}={}", field, redact_account_id(value)),
                _ => format!("{}={}", field, value),
            })
            .collect::<Vec<_>>()
            .join(" ")
    }
}
