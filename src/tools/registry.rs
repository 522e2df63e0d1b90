//! Tool registry - the catalog of every known tool
//!
//! Maps tool identifiers (`"{domain}.{name}"`) to entries in insertion order.
//! Domain and tag lookups are derived views computed by a linear scan; the
//! catalog is small, read-heavy and written once at startup.
//!
//! The registry is a plain value. Callers that need to share it across threads
//! wrap it themselves (the agent factory keeps it behind an `RwLock`).

use std::collections::BTreeSet;
use std::fmt;

use indexmap::IndexMap;
use serde::Serialize;

use crate::error::{Result, ToolbeltError};

use super::loader::{Discovery, DiscoveryReport, ToolLoader};
use super::marker::{ToolFn, ToolMetadata};

/// A registered tool: the callable plus its metadata
#[derive(Debug, Clone)]
pub struct ToolEntry {
    pub function: ToolFn,
    pub metadata: ToolMetadata,
}

/// Aggregate view of the registry
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RegistrySummary {
    pub total_tools: usize,
    pub domains: Vec<String>,
    pub tools_per_domain: IndexMap<String, usize>,
}

/// Catalog of discovered tools
#[derive(Debug, Clone, Default)]
pub struct ToolRegistry {
    tools: IndexMap<String, ToolEntry>,
}

impl ToolRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or overwrite a tool under `tool_id`
    ///
    /// Overwriting keeps the original insertion position and logs a warning.
    pub fn register(&mut self, tool_id: impl Into<String>, function: ToolFn, metadata: ToolMetadata) -> Result<()> {
        let tool_id = tool_id.into();
        if tool_id.trim().is_empty() {
            return Err(ToolbeltError::InvalidIdentifier(tool_id));
        }

        let entry = ToolEntry { function, metadata };
        if let Some(previous) = self.tools.insert(tool_id.clone(), entry) {
            log::warn!(
                "Tool identifier collision: {} (from '{}') replaced",
                tool_id,
                previous.metadata.source_module
            );
        } else {
            log::debug!("Registered tool: {}", tool_id);
        }
        Ok(())
    }

    /// Register a marked callable under its own identifier
    pub fn register_tool(&mut self, function: ToolFn) -> Result<()> {
        let metadata = function
            .metadata()
            .cloned()
            .ok_or_else(|| ToolbeltError::NotATool(function.ident().to_string()))?;
        self.register(metadata.id(), function, metadata)
    }

    /// Register everything a discovery pass found, returning how many were added
    pub fn register_all(&mut self, discovery: Discovery) -> usize {
        let mut registered = 0;
        for (tool_id, function) in discovery.tools {
            let Some(metadata) = function.metadata().cloned() else {
                continue;
            };
            match self.register(tool_id, function, metadata) {
                Ok(()) => registered += 1,
                Err(e) => log::error!("Skipping discovered tool: {}", e),
            }
        }
        registered
    }

    /// All tools whose domain equals `domain`, in insertion order
    pub fn get_by_domain(&self, domain: &str) -> Vec<ToolEntry> {
        let tools: Vec<ToolEntry> = self
            .tools
            .values()
            .filter(|entry| entry.metadata.domain == domain)
            .cloned()
            .collect();
        log::debug!("Found {} tools for domain '{}'", tools.len(), domain);
        tools
    }

    /// All tools carrying at least one of `tags`
    pub fn get_by_tags<S: AsRef<str>>(&self, tags: &[S]) -> Vec<ToolEntry> {
        let tools: Vec<ToolEntry> = self
            .tools
            .values()
            .filter(|entry| entry.metadata.has_any_tag(tags))
            .cloned()
            .collect();
        log::debug!("Found {} tools matching {} tags", tools.len(), tags.len());
        tools
    }

    /// Look up a tool by identifier
    pub fn get(&self, tool_id: &str) -> Option<&ToolEntry> {
        let entry = self.tools.get(tool_id);
        if entry.is_none() {
            log::debug!("Tool not found: {}", tool_id);
        }
        entry
    }

    /// Snapshot of every entry
    pub fn list_all(&self) -> IndexMap<String, ToolEntry> {
        self.tools.clone()
    }

    /// Distinct domains, sorted
    pub fn list_domains(&self) -> Vec<String> {
        self.tools
            .values()
            .map(|entry| entry.metadata.domain.clone())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }

    /// Registered identifiers, sorted
    pub fn list_tool_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.tools.keys().cloned().collect();
        ids.sort();
        ids
    }

    /// Number of tools, optionally restricted to one domain
    pub fn count(&self, domain: Option<&str>) -> usize {
        match domain {
            None => self.tools.len(),
            Some(d) => self.tools.values().filter(|entry| entry.metadata.domain == d).count(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    /// Remove every tool
    pub fn clear(&mut self) {
        let count = self.tools.len();
        self.tools.clear();
        log::info!("Cleared {} tools from registry", count);
    }

    /// Clear, then re-run discovery and register everything it finds
    pub fn reload(&mut self, loader: &ToolLoader) -> DiscoveryReport {
        log::info!("Reloading tool registry...");
        self.clear();

        let discovery = loader.discover();
        let report = discovery.report.clone();
        self.register_all(discovery);

        log::info!("Reload complete: {} tools registered", self.tools.len());
        report
    }

    /// Totals per domain
    pub fn summary(&self) -> RegistrySummary {
        let domains = self.list_domains();
        let tools_per_domain = domains
            .iter()
            .map(|d| (d.clone(), self.count(Some(d))))
            .collect();
        RegistrySummary {
            total_tools: self.tools.len(),
            domains,
            tools_per_domain,
        }
    }
}

impl fmt::Display for ToolRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "<ToolRegistry: {} tools across {} domains>",
            self.tools.len(),
            self.list_domains().len()
        )
    }
}
