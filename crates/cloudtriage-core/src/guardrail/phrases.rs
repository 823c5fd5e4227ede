//! Phrase and keyword lists

use serde::{Deserialize, Serialize};

fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

/// English heuristics used by the gate; every list can be replaced from config
///
/// Phrases match as lowercase substrings. Keywords match whole words, so
/// `adf` does not fire on `adfs`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GuardrailPhrases {
    /// Requests that name no particular resource group
    pub generic_group_queries: Vec<String>,
    /// Requests that name no particular resource
    pub generic_resource_queries: Vec<String>,
    /// Follow-ups that refer to the scope already in context
    pub same_scope_phrases: Vec<String>,
    pub group_keywords: Vec<String>,
    /// Token suffixes that mark a resource-group name (`sales-rg`)
    pub group_name_suffixes: Vec<String>,
    pub resource_keywords: Vec<String>,
}

impl Default for GuardrailPhrases {
    fn default() -> Self {
        Self {
            generic_group_queries: strings(&[
                "list all subscriptions",
                "list subscriptions",
                "list my subscriptions",
                "show subscriptions",
                "show all subscriptions",
                "switch subscription",
                "list all resource groups",
                "list resource groups",
                "show all resource groups",
                "show resource groups",
                "what resource groups",
                "which resource groups",
            ]),
            generic_resource_queries: strings(&[
                "list all subscriptions",
                "list subscriptions",
                "list my subscriptions",
                "show subscriptions",
                "switch subscription",
                "list all resource groups",
                "list resource groups",
                "list all resources",
                "list resources",
                "list all data factories",
                "list data factories",
                "list all key vaults",
                "list key vaults",
                "list all vaults",
                "list all batch accounts",
                "list batch accounts",
                "list all storage accounts",
                "list storage accounts",
            ]),
            same_scope_phrases: strings(&[
                "same data factory",
                "same factory",
                "same resource group",
                "same vault",
                "same key vault",
                "same batch account",
                "same resource",
                "same subscription",
            ]),
            group_keywords: strings(&["resource group", "resource-group", "resourcegroup", "rg"]),
            group_name_suffixes: strings(&["-rg", "_rg"]),
            resource_keywords: strings(&[
                "data factory",
                "factory",
                "adf",
                "key vault",
                "keyvault",
                "vault",
                "batch account",
                "batch pool",
                "storage account",
            ]),
        }
    }
}

impl GuardrailPhrases {
    pub fn is_generic_group_query(&self, text: &str) -> bool {
        contains_any(text, &self.generic_group_queries)
    }

    pub fn is_generic_resource_query(&self, text: &str) -> bool {
        contains_any(text, &self.generic_resource_queries)
    }

    pub fn is_same_scope(&self, text: &str) -> bool {
        contains_any(text, &self.same_scope_phrases)
    }

    /// A group keyword, or a token that looks like a group name
    pub fn mentions_group(&self, text: &str) -> bool {
        let tokens = Tokens::new(text);
        tokens.find_any(&self.group_keywords).is_some()
            || tokens.iter_lower().any(|t| self.looks_like_group_name(t))
    }

    pub fn mentions_resource(&self, text: &str) -> bool {
        Tokens::new(text).find_any(&self.resource_keywords).is_some()
    }

    pub fn looks_like_group_name(&self, token: &str) -> bool {
        let lower = token.to_lowercase();
        lower.starts_with("rg-")
            || lower.starts_with("rg_")
            || self
                .group_name_suffixes
                .iter()
                .any(|s| lower.len() > s.len() && lower.ends_with(s.as_str()))
    }
}

fn contains_any(text: &str, phrases: &[String]) -> bool {
    let lower = text.to_lowercase();
    phrases
        .iter()
        .any(|p| !p.is_empty() && lower.contains(&p.to_lowercase()))
}

/// Words of a request, punctuation trimmed, original case kept
#[derive(Debug, Clone)]
pub struct Tokens {
    words: Vec<String>,
    lower: Vec<String>,
}

impl Tokens {
    pub fn new(text: &str) -> Self {
        let words: Vec<String> = text
            .split_whitespace()
            .map(|w| w.trim_matches(|c: char| !(c.is_alphanumeric() || c == '-' || c == '_')))
            .filter(|w| !w.is_empty())
            .map(|w| w.to_string())
            .collect();
        let lower = words.iter().map(|w| w.to_lowercase()).collect();
        Self { words, lower }
    }

    pub fn len(&self) -> usize {
        self.words.len()
    }

    pub fn is_empty(&self) -> bool {
        self.words.is_empty()
    }

    pub fn word(&self, index: usize) -> Option<&str> {
        self.words.get(index).map(|s| s.as_str())
    }

    pub fn lower(&self, index: usize) -> Option<&str> {
        self.lower.get(index).map(|s| s.as_str())
    }

    pub fn iter_words(&self) -> impl Iterator<Item = &str> {
        self.words.iter().map(|s| s.as_str())
    }

    pub fn iter_lower(&self) -> impl Iterator<Item = &str> {
        self.lower.iter().map(|s| s.as_str())
    }

    /// Every (start, word count) where `keyword` occurs as whole words
    pub fn find(&self, keyword: &str) -> Vec<(usize, usize)> {
        let parts: Vec<String> = keyword.split_whitespace().map(|p| p.to_lowercase()).collect();
        if parts.is_empty() || parts.len() > self.lower.len() {
            return Vec::new();
        }
        (0..=self.lower.len() - parts.len())
            .filter(|&i| parts.iter().enumerate().all(|(j, p)| &self.lower[i + j] == p))
            .map(|i| (i, parts.len()))
            .collect()
    }

    /// First occurrence of any keyword
    pub fn find_any(&self, keywords: &[String]) -> Option<(usize, usize)> {
        keywords
            .iter()
            .flat_map(|k| self.find(k))
            .min_by_key(|(start, _)| *start)
    }
}
