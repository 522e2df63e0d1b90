//! Agent factory - builds agents from descriptor files
//!
//! Owns the tool registry (shared behind `Arc<RwLock<_>>`), the loader used
//! to fill and reload it, and the provider factory used for chat clients.

use std::path::{Path, PathBuf};
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use indexmap::IndexMap;

use crate::error::Result;
use crate::llm::ProviderFactory;
use crate::tools::{DiscoveryReport, RegistrySummary, ToolLoader, ToolRegistry};

use super::agent::{Agent, DEFAULT_MAX_TOOL_ROUNDS};
use super::descriptor::AgentDescriptor;
use super::resolve::resolve_tools;
use super::tool_context::inject_tool_context;

const DESCRIPTOR_EXTENSIONS: [&str; 2] = ["yaml", "yml"];

/// Shared descriptor file name that is never an agent itself
const SHARED_CONFIG_STEM: &str = "agent_config";

/// Builds `Agent`s from `AgentDescriptor`s
pub struct AgentFactory {
    loader: ToolLoader,
    registry: Arc<RwLock<ToolRegistry>>,
    providers: ProviderFactory,
}

impl AgentFactory {
    /// Factory with a fresh registry, filled by running discovery
    pub fn new(loader: ToolLoader) -> Self {
        Self::with_registry(loader, Arc::new(RwLock::new(ToolRegistry::new())))
    }

    /// Factory over an existing registry; discovery only runs if it is empty
    pub fn with_registry(loader: ToolLoader, registry: Arc<RwLock<ToolRegistry>>) -> Self {
        let factory = Self {
            loader,
            registry,
            providers: ProviderFactory::new(),
        };
        factory.ensure_tools_loaded();
        log::info!("AgentFactory initialized");
        factory
    }

    pub fn with_providers(mut self, providers: ProviderFactory) -> Self {
        self.providers = providers;
        self
    }

    pub fn loader(&self) -> &ToolLoader {
        &self.loader
    }

    pub fn providers(&self) -> &ProviderFactory {
        &self.providers
    }

    /// Handle to the shared registry
    pub fn registry(&self) -> Arc<RwLock<ToolRegistry>> {
        Arc::clone(&self.registry)
    }

    fn read_registry(&self) -> RwLockReadGuard<'_, ToolRegistry> {
        self.registry.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write_registry(&self) -> RwLockWriteGuard<'_, ToolRegistry> {
        self.registry.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Run discovery if the registry is empty; returns the tool count
    pub fn ensure_tools_loaded(&self) -> usize {
        let mut registry = self.write_registry();
        if registry.is_empty() {
            log::info!("No tools in registry, running discovery...");
            let discovery = self.loader.discover();
            let added = registry.register_all(discovery);
            log::info!("Loaded {} tools into registry", added);
        } else {
            log::info!("Registry already contains {} tools", registry.count(None));
        }
        registry.count(None)
    }

    /// Build an agent from a descriptor file
    pub fn from_yaml(&self, path: impl AsRef<Path>) -> Result<Agent> {
        let path = path.as_ref();
        log::info!("Loading agent from: {}", path.display());
        let descriptor = AgentDescriptor::from_file(path)?;
        self.from_descriptor(&descriptor)
    }

    /// Build an agent from an already parsed descriptor
    pub fn from_descriptor(&self, descriptor: &AgentDescriptor) -> Result<Agent> {
        descriptor.validate()?;

        let resolved = {
            let registry = self.read_registry();
            resolve_tools(&registry, descriptor)
        };

        let instructions = if descriptor.inject_tool_context {
            inject_tool_context(
                &descriptor.instructions,
                &resolved.tools,
                descriptor.compact_tool_context,
            )
        } else {
            descriptor.instructions.clone()
        };

        let client = self.providers.build(&descriptor.model)?;

        let agent = Agent::new(
            &descriptor.name,
            &descriptor.description,
            instructions,
            resolved.tools,
            client,
        )
        .with_max_tool_rounds(descriptor.max_tool_rounds.unwrap_or(DEFAULT_MAX_TOOL_ROUNDS));

        log::info!("Created agent '{}' with {} tools", agent.name, agent.tools.len());
        Ok(agent)
    }

    /// Agent keys (descriptor file stems) found in `dir`, sorted
    pub fn list_available_configs(dir: impl AsRef<Path>) -> Vec<String> {
        descriptor_files(dir.as_ref()).into_iter().map(|(stem, _)| stem).collect()
    }

    /// Build every agent in `dir`; failures are logged and skipped
    pub fn discover_all_agents(&self, dir: impl AsRef<Path>) -> IndexMap<String, Agent> {
        let dir = dir.as_ref();
        log::info!("Discovering agents in {}", dir.display());

        let mut agents = IndexMap::new();
        for (key, path) in descriptor_files(dir) {
            match self.from_yaml(&path) {
                Ok(agent) => {
                    log::info!("  {}: {}", key, agent.name);
                    agents.insert(key, agent);
                }
                Err(e) => log::error!("  {}: Failed to load - {}", key, e),
            }
        }

        log::info!("Discovered {} agents", agents.len());
        agents
    }

    /// Clear the registry and run discovery again
    pub fn reload_tools(&self) -> DiscoveryReport {
        log::info!("Reloading tools...");
        let mut registry = self.write_registry();
        let report = registry.reload(&self.loader);
        log::info!("Tools reloaded: {} total", registry.count(None));
        report
    }

    pub fn registry_summary(&self) -> RegistrySummary {
        self.read_registry().summary()
    }
}

impl std::fmt::Debug for AgentFactory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AgentFactory")
            .field("loader", &self.loader)
            .field("tools", &self.read_registry().count(None))
            .field("providers", &self.providers)
            .finish()
    }
}

/// `(stem, path)` of every agent descriptor in `dir`, sorted by stem
///
/// When both `x.yaml` and `x.yml` exist, `x.yaml` wins.
fn descriptor_files(dir: &Path) -> Vec<(String, PathBuf)> {
    if !dir.is_dir() {
        log::warn!("Config directory not found: {}", dir.display());
        return Vec::new();
    }

    let base = glob::Pattern::escape(&dir.to_string_lossy());
    let mut files: IndexMap<String, PathBuf> = IndexMap::new();
    for ext in DESCRIPTOR_EXTENSIONS {
        let pattern = format!("{}/*.{}", base, ext);
        let Ok(paths) = glob::glob(&pattern) else {
            log::error!("Invalid descriptor pattern {}", pattern);
            continue;
        };
        for path in paths.flatten() {
            let Some(stem) = path.file_stem().and_then(|s| s.to_str()).map(str::to_string) else {
                continue;
            };
            if stem == SHARED_CONFIG_STEM || stem.starts_with('_') || !path.is_file() {
                continue;
            }
            files.entry(stem).or_insert(path);
        }
    }

    files.sort_keys();
    files.into_iter().collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ToolbeltError;
    use crate::tools::HandlerTable;
    use std::fs;
    use tempfile::TempDir;

    fn write(root: &Path, rel: &str, content: &str) {
        let path = root.join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, content).unwrap();
    }

    fn tools_tree() -> TempDir {
        let dir = TempDir::new().unwrap();
        write(
            dir.path(),
            "weather/current.yaml",
            "exports:\n  - handler: get_weather\n  - handler: get_forecast\n",
        );
        write(dir.path(), "stock/quotes.yaml", "exports:\n  - handler: get_stock_price\n");
        dir
    }

    fn mock_providers() -> ProviderFactory {
        ProviderFactory::new().with_env(|_| None).with_default_provider("mock")
    }

    fn factory(tools: &TempDir) -> AgentFactory {
        let loader = ToolLoader::new(tools.path(), HandlerTable::builtin()).with_quiet(true);
        AgentFactory::new(loader).with_providers(mock_providers())
    }

    #[test]
    fn test_new_runs_discovery() {
        let tools = tools_tree();
        let factory = factory(&tools);
        let summary = factory.registry_summary();
        assert_eq!(summary.total_tools, 3);
        assert_eq!(summary.domains, vec!["stock", "weather"]);
    }

    #[test]
    fn test_existing_registry_is_not_reloaded() {
        let tools = tools_tree();
        let registry = Arc::new(RwLock::new(ToolRegistry::new()));
        let first = AgentFactory::with_registry(ToolLoader::new(tools.path(), HandlerTable::builtin()), registry.clone());
        assert_eq!(first.ensure_tools_loaded(), 3);

        write(tools.path(), "calendar/events.yaml", "exports:\n  - handler: list_events\n");
        let second = AgentFactory::with_registry(ToolLoader::new(tools.path(), HandlerTable::builtin()), registry);
        assert_eq!(second.registry_summary().total_tools, 3);

        assert_eq!(second.reload_tools().tools_found, 4);
        assert_eq!(first.registry_summary().total_tools, 4);
    }

    #[test]
    fn test_from_descriptor_resolves_tools() {
        let tools = tools_tree();
        let factory = factory(&tools);
        let descriptor = AgentDescriptor::new("WeatherAgent", "Weather", "Help with weather")
            .with_domains(["weather"])
            .with_tags(["price"]);
        let agent = factory.from_descriptor(&descriptor).unwrap();

        assert_eq!(agent.tool_names(), vec!["get_weather", "get_forecast", "get_stock_price"]);
        assert_eq!(agent.instructions, "Help with weather");
        assert_eq!(agent.client().provider(), "mock");
        assert_eq!(agent.max_tool_rounds(), DEFAULT_MAX_TOOL_ROUNDS);
    }

    #[test]
    fn test_from_descriptor_injects_context() {
        let tools = tools_tree();
        let factory = factory(&tools);
        let descriptor = AgentDescriptor {
            inject_tool_context: true,
            compact_tool_context: true,
            max_tool_rounds: Some(3),
            ..AgentDescriptor::new("StockAgent", "Stocks", "Help with stocks").with_domains(["stock"])
        };
        let agent = factory.from_descriptor(&descriptor).unwrap();
        assert!(agent.instructions.starts_with("Help with stocks\n\n===="));
        assert!(agent.instructions.contains("- get_stock_price:"));
        assert_eq!(agent.max_tool_rounds(), 3);
    }

    #[test]
    fn test_from_descriptor_provider_failure() {
        let tools = tools_tree();
        let factory = factory(&tools);
        let descriptor = AgentDescriptor::new("a", "b", "c").with_model(crate::llm::ModelConfig::with_provider("openai"));
        let err = factory.from_descriptor(&descriptor).unwrap_err();
        assert!(matches!(err, ToolbeltError::MissingCredential { .. }));
    }

    #[test]
    fn test_list_available_configs() {
        let agents = TempDir::new().unwrap();
        write(agents.path(), "weather_agent.yaml", "");
        write(agents.path(), "stock_agent.yml", "");
        write(agents.path(), "agent_config.yaml", "");
        write(agents.path(), "_draft.yaml", "");
        write(agents.path(), "notes.txt", "");

        assert_eq!(
            AgentFactory::list_available_configs(agents.path()),
            vec!["stock_agent", "weather_agent"]
        );
    }

    #[test]
    fn test_list_available_configs_missing_dir() {
        assert!(AgentFactory::list_available_configs("/nonexistent/agents").is_empty());
    }

    #[test]
    fn test_discover_all_agents_skips_failures() {
        let tools = tools_tree();
        let factory = factory(&tools);
        let agents = TempDir::new().unwrap();
        write(
            agents.path(),
            "weather_agent.yaml",
            "name: WeatherAgent\ndescription: Weather\ninstructions: Be helpful\ntool_domains: [weather]\n",
        );
        write(agents.path(), "broken_agent.yaml", "name: Broken\n");
        write(
            agents.path(),
            "stock_agent.yaml",
            "name: StockAgent\ndescription: Stocks\ninstructions: Be precise\ntool_domains: [stock]\n",
        );

        let built = factory.discover_all_agents(agents.path());
        let keys: Vec<&String> = built.keys().collect();
        assert_eq!(keys, vec!["stock_agent", "weather_agent"]);
        assert_eq!(built["weather_agent"].tools.len(), 2);
        assert_eq!(built["stock_agent"].name, "StockAgent");
    }

    #[test]
    fn test_from_yaml_missing_file() {
        let tools = tools_tree();
        let factory = factory(&tools);
        assert!(factory.from_yaml("/nonexistent/agent.yaml").is_err());
    }
}
