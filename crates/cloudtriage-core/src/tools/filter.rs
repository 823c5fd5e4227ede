//! Tool filter

use std::collections::HashSet;

use crate::config::McpSettings;
use crate::types::ToolDescriptor;

/// Pure allow-list predicate over tool names
///
/// A tool passes when its name is listed exactly, starts with an allowed
/// prefix, or contains an allowed pattern; excluded names never pass. An
/// empty filter allows nothing.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ToolFilter {
    exact: HashSet<String>,
    prefixes: Vec<String>,
    patterns: Vec<String>,
    exclude: HashSet<String>,
    allow_all: bool,
}

impl ToolFilter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every tool passes unless excluded
    pub fn allow_all() -> Self {
        Self {
            allow_all: true,
            ..Self::default()
        }
    }

    /// Filter from the `mcp` settings section
    pub fn from_settings(settings: &McpSettings) -> Self {
        Self::new()
            .with_exact(settings.allow_tools.iter().cloned())
            .with_prefixes(settings.allow_prefixes.iter().cloned())
            .with_patterns(settings.allow_patterns.iter().cloned())
    }

    pub fn with_exact(mut self, names: impl IntoIterator<Item = String>) -> Self {
        self.exact.extend(names);
        self
    }

    pub fn with_prefixes(mut self, prefixes: impl IntoIterator<Item = String>) -> Self {
        self.prefixes.extend(prefixes.into_iter().filter(|p| !p.is_empty()));
        self
    }

    pub fn with_patterns(mut self, patterns: impl IntoIterator<Item = String>) -> Self {
        self.patterns.extend(patterns.into_iter().filter(|p| !p.is_empty()));
        self
    }

    pub fn with_exclude(mut self, names: impl IntoIterator<Item = String>) -> Self {
        self.exclude.extend(names);
        self
    }

    pub fn allow(&self, tool: &ToolDescriptor) -> bool {
        self.allows_name(&tool.name)
    }

    pub fn allows_name(&self, name: &str) -> bool {
        if self.exclude.contains(name) {
            return false;
        }
        self.allow_all
            || self.exact.contains(name)
            || self.prefixes.iter().any(|p| name.starts_with(p.as_str()))
            || self.patterns.iter().any(|p| name.contains(p.as_str()))
    }

    /// Keep the allowed tools, in catalog order
    pub fn apply(&self, tools: Vec<ToolDescriptor>) -> Vec<ToolDescriptor> {
        tools.into_iter().filter(|t| self.allow(t)).collect()
    }
}
