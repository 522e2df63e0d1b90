//! Tool-set resolution for an agent descriptor
//!
//! Domains first (in descriptor order), then tag matches, then exclusions by
//! name. A tool reached twice (same identifier and same callable) is kept
//! once, at its first position. One handler exported under two identifiers
//! counts as two tools.

use indexmap::IndexMap;

use crate::tools::{ToolEntry, ToolRegistry};

use super::descriptor::AgentDescriptor;

/// The tools an agent ends up with, plus where they came from
#[derive(Debug, Clone, Default)]
pub struct ResolvedToolSet {
    pub tools: Vec<ToolEntry>,
    /// Newly added tools per source (`domain:<name>`, `tags`)
    pub counts_by_source: IndexMap<String, usize>,
    pub excluded: usize,
}

impl ResolvedToolSet {
    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    /// Tool names in resolution order
    pub fn names(&self) -> Vec<&str> {
        self.tools.iter().map(|e| e.metadata.name.as_str()).collect()
    }

    fn push_unique(&mut self, entry: ToolEntry, source: &str) {
        let id = entry.metadata.id();
        if self
            .tools
            .iter()
            .any(|t| t.metadata.id() == id && t.function.same_callable(&entry.function))
        {
            return;
        }
        self.tools.push(entry);
        *self.counts_by_source.entry(source.to_string()).or_insert(0) += 1;
    }
}

/// Resolve the tool set a descriptor asks for
pub fn resolve_tools(registry: &ToolRegistry, descriptor: &AgentDescriptor) -> ResolvedToolSet {
    let mut resolved = ResolvedToolSet::default();

    for domain in &descriptor.tool_domains {
        let source = format!("domain:{}", domain);
        let domain_tools = registry.get_by_domain(domain);
        if domain_tools.is_empty() {
            log::warn!("Agent '{}' asked for domain '{}' but it has no tools", descriptor.name, domain);
        }
        for entry in domain_tools {
            resolved.push_unique(entry, &source);
        }
    }

    if let Some(tags) = &descriptor.tool_tags {
        for entry in registry.get_by_tags(tags) {
            resolved.push_unique(entry, "tags");
        }
    }

    if !descriptor.exclude_tools.is_empty() {
        let before = resolved.tools.len();
        resolved
            .tools
            .retain(|entry| !descriptor.exclude_tools.contains(&entry.metadata.name));
        resolved.excluded = before - resolved.tools.len();
        if resolved.excluded > 0 {
            log::info!("Excluded {} tools", resolved.excluded);
        }
    }

    log::info!("Tool discovery results for '{}':", descriptor.name);
    for (source, count) in &resolved.counts_by_source {
        log::info!("  - {} tools from {}", count, source);
    }

    resolved
}
