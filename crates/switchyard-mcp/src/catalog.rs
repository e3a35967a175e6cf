//! Capability catalog: the merged tool namespace across providers.

use chrono::{DateTime, Utc};
use std::collections::HashMap;
use switchyard_types::ToolDescriptor;

/// Immutable snapshot of every published tool and its owning provider.
///
/// `tools` and `owners` always have the same key set: the only way to add an
/// entry is [`CatalogBuilder::merge`], which writes both.
#[derive(Debug, Clone, Default)]
pub struct Catalog {
    tools: HashMap<String, ToolDescriptor>,
    owners: HashMap<String, String>,
    refreshed_at: Option<DateTime<Utc>>,
}

/// Accumulates provider tool lists into a fresh catalog.
#[derive(Debug, Default)]
pub struct CatalogBuilder {
    tools: HashMap<String, ToolDescriptor>,
    owners: HashMap<String, String>,
}

impl CatalogBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a provider's tools, tagging each with the provider name.
    ///
    /// A name already present is overwritten (last writer wins). Returns the
    /// names that collided.
    pub fn merge(&mut self, provider: &str, tools: Vec<ToolDescriptor>) -> Vec<String> {
        let mut collisions = Vec::new();
        for mut tool in tools {
            tool.provider = provider.to_string();
            if let Some(previous) = self.owners.insert(tool.name.clone(), provider.to_string()) {
                tracing::warn!(
                    "Tool name collision: '{}' from '{}' replaces the one from '{}'",
                    tool.name,
                    provider,
                    previous
                );
                collisions.push(tool.name.clone());
            }
            self.tools.insert(tool.name.clone(), tool);
        }
        collisions
    }

    /// Finish the catalog, stamping it with the current time.
    pub fn build(self) -> Catalog {
        Catalog {
            tools: self.tools,
            owners: self.owners,
            refreshed_at: Some(Utc::now()),
        }
    }
}

impl Catalog {
    /// An empty catalog that has never been refreshed.
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn builder() -> CatalogBuilder {
        CatalogBuilder::new()
    }

    pub fn get(&self, tool_name: &str) -> Option<&ToolDescriptor> {
        self.tools.get(tool_name)
    }

    /// Name of the provider serving `tool_name`.
    pub fn owner(&self, tool_name: &str) -> Option<&str> {
        self.owners.get(tool_name).map(String::as_str)
    }

    /// Copy of every descriptor, sorted by tool name.
    pub fn snapshot(&self) -> Vec<ToolDescriptor> {
        let mut tools: Vec<ToolDescriptor> = self.tools.values().cloned().collect();
        tools.sort_by(|a, b| a.name.cmp(&b.name));
        tools
    }

    /// A copy of this catalog with every tool of `provider` removed.
    ///
    /// The refresh timestamp is kept: eviction is not a refresh.
    pub fn without_provider(&self, provider: &str) -> Catalog {
        let owners: HashMap<String, String> = self
            .owners
            .iter()
            .filter(|(_, owner)| owner.as_str() != provider)
            .map(|(name, owner)| (name.clone(), owner.clone()))
            .collect();
        let tools = self
            .tools
            .iter()
            .filter(|(name, _)| owners.contains_key(name.as_str()))
            .map(|(name, tool)| (name.clone(), tool.clone()))
            .collect();
        Catalog {
            tools,
            owners,
            refreshed_at: self.refreshed_at,
        }
    }

    /// Number of tools owned by `provider`.
    pub fn tools_for_provider(&self, provider: &str) -> usize {
        self.owners.values().filter(|owner| *owner == provider).count()
    }

    pub fn refreshed_at(&self) -> Option<DateTime<Utc>> {
        self.refreshed_at
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    /// Whether the descriptor and owner maps have the same key set.
    pub fn is_consistent(&self) -> bool {
        self.tools.len() == self.owners.len()
            && self.tools.keys().all(|name| self.owners.contains_key(name))
    }
}
