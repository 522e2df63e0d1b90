use clap::Parser;
use colored::*;
use eyre::{Context, Result, eyre};
use log::info;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use toolbelt::agents::{Agent, AgentFactory};
use toolbelt::llm::ProviderFactory;
use toolbelt::tools::{HandlerTable, ToolEntry, ToolLoader, quiet_from_env};
use toolbelt::workflow::{ConcurrentWorkflow, SequentialWorkflow, WorkflowOutput};

mod cli;
mod config;

use cli::Cli;
use cli::commands::{AgentsCommands, Commands, ToolsCommands, WorkflowMode};
use config::Config;

fn setup_logging(level: Option<&str>) -> Result<()> {
    // Create log directory
    let log_dir = dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("toolbelt")
        .join("logs");

    fs::create_dir_all(&log_dir).context("Failed to create log directory")?;

    let log_file = log_dir.join("toolbelt.log");

    // Setup env_logger with file output
    let target = Box::new(
        fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&log_file)
            .context("Failed to open log file")?,
    );

    // RUST_LOG wins over the configured level
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level.unwrap_or("info")))
        .target(env_logger::Target::Pipe(target))
        .init();

    info!("Logging initialized, writing to: {}", log_file.display());
    Ok(())
}

/// Directories and flags after applying CLI overrides to the config
struct Settings {
    tools_dir: PathBuf,
    agents_dir: PathBuf,
    quiet: bool,
    default_provider: String,
}

impl Settings {
    fn resolve(cli: &Cli, config: &Config) -> Self {
        Self {
            tools_dir: cli.tools_dir.clone().unwrap_or_else(|| config.tools_dir.clone()),
            agents_dir: cli.agents_dir.clone().unwrap_or_else(|| config.agents_dir.clone()),
            quiet: cli.quiet || config.quiet || quiet_from_env(),
            default_provider: config.default_provider.clone(),
        }
    }

    fn factory(&self) -> AgentFactory {
        let loader = ToolLoader::new(&self.tools_dir, HandlerTable::builtin()).with_quiet(self.quiet);
        AgentFactory::new(loader).with_providers(ProviderFactory::new().with_default_provider(&self.default_provider))
    }
}

fn run_application(cli: &Cli, config: &Config) -> Result<()> {
    info!("Starting application");

    if cli.is_verbose() {
        println!("{}", "Verbose mode enabled".yellow());
    }

    let settings = Settings::resolve(cli, config);

    match &cli.command {
        None => handle_tools_summary(&settings, false),
        Some(Commands::Tools { command }) => match command {
            ToolsCommands::List { domain, tags, json } => handle_tools_list(&settings, domain.as_deref(), tags, *json),
            ToolsCommands::Summary { json } => handle_tools_summary(&settings, *json),
            ToolsCommands::Call { tool_id, args } => handle_tools_call(&settings, tool_id, args),
        },
        Some(Commands::Agents { command }) => match command {
            AgentsCommands::List => handle_agents_list(&settings),
            AgentsCommands::Show { agent } => handle_agents_show(&settings, agent),
        },
        Some(Commands::Run { agent, prompt }) => handle_run(&settings, agent, prompt, cli.is_verbose()),
        Some(Commands::Workflow {
            mode,
            prompt,
            agents,
            synthesizer,
        }) => handle_workflow(&settings, *mode, prompt, agents, synthesizer.as_deref(), cli.is_verbose()),
    }
}

fn snapshot(factory: &AgentFactory) -> Result<toolbelt::tools::ToolRegistry> {
    let registry = factory.registry();
    let guard = registry.read().map_err(|e| eyre!("Tool registry lock poisoned: {}", e))?;
    Ok(guard.clone())
}

fn print_tool(entry: &ToolEntry) {
    let metadata = &entry.metadata;
    let mock = if metadata.mock { " (mock)".dimmed().to_string() } else { String::new() };
    println!("  {}{}", metadata.id().cyan(), mock);
    println!("      {}", metadata.description);
    if !metadata.tags.is_empty() {
        println!("      tags: {}", metadata.tags.join(", ").dimmed());
    }
}

fn handle_tools_list(settings: &Settings, domain: Option<&str>, tags: &[String], json: bool) -> Result<()> {
    info!("Listing tools - domain: {:?}, tags: {:?}", domain, tags);
    let registry = snapshot(&settings.factory())?;

    let entries: Vec<ToolEntry> = registry
        .list_all()
        .into_values()
        .filter(|e| domain.is_none_or(|d| e.metadata.domain == d))
        .filter(|e| tags.is_empty() || e.metadata.has_any_tag(tags))
        .collect();

    if json {
        let metadata: Vec<_> = entries.iter().map(|e| &e.metadata).collect();
        println!("{}", serde_json::to_string_pretty(&metadata)?);
        return Ok(());
    }

    if entries.is_empty() {
        println!("{}", "No tools found".yellow());
        return Ok(());
    }
    for entry in &entries {
        print_tool(entry);
    }
    Ok(())
}

fn handle_tools_summary(settings: &Settings, json: bool) -> Result<()> {
    let factory = settings.factory();
    let summary = factory.registry_summary();

    if json {
        println!("{}", serde_json::to_string_pretty(&summary)?);
        return Ok(());
    }

    println!("{} {}", "Tools directory:".green(), settings.tools_dir.display());
    println!("{} {}", "Total tools:".green(), summary.total_tools);
    for (domain, count) in &summary.tools_per_domain {
        println!("  {:<16} {}", domain.cyan(), count);
    }
    Ok(())
}

fn handle_tools_call(settings: &Settings, tool_id: &str, args: &str) -> Result<()> {
    info!("Calling tool {} with {}", tool_id, args);
    let args: serde_json::Value = serde_json::from_str(args).context("Tool arguments must be a JSON object")?;
    let registry = snapshot(&settings.factory())?;
    let entry = registry
        .get(tool_id)
        .ok_or_else(|| toolbelt::ToolbeltError::ToolNotFound(tool_id.to_string()))?;

    let output = entry.function.call(&args);
    if output.is_error {
        return Err(eyre!("{}", output.content));
    }
    println!("{}", output.content);
    Ok(())
}

fn handle_agents_list(settings: &Settings) -> Result<()> {
    let configs = AgentFactory::list_available_configs(&settings.agents_dir);
    if configs.is_empty() {
        println!("{} {}", "No agents found in".yellow(), settings.agents_dir.display());
        return Ok(());
    }
    for name in configs {
        println!("  {}", name.cyan());
    }
    Ok(())
}

/// Path of the descriptor for `key`, preferring `.yaml`
fn descriptor_path(dir: &Path, key: &str) -> Result<PathBuf> {
    ["yaml", "yml"]
        .iter()
        .map(|ext| dir.join(format!("{}.{}", key, ext)))
        .find(|p| p.is_file())
        .ok_or_else(|| eyre!("No agent descriptor named '{}' in {}", key, dir.display()))
}

fn handle_agents_show(settings: &Settings, key: &str) -> Result<()> {
    let path = descriptor_path(&settings.agents_dir, key)?;
    let factory = settings.factory();
    let agent = factory
        .from_yaml(&path)
        .context(format!("Failed to build agent '{}'", key))?;

    println!("{} {}", "Agent:".green(), agent.name);
    println!("{} {}", "Description:".green(), agent.description);
    println!(
        "{} {} ({})",
        "Provider:".green(),
        agent.client().provider(),
        agent.client().model()
    );
    println!("{} {}", "Tools:".green(), agent.tools.len());
    for entry in &agent.tools {
        print_tool(entry);
    }
    Ok(())
}

fn handle_run(settings: &Settings, key: &str, prompt: &str, verbose: bool) -> Result<()> {
    let path = descriptor_path(&settings.agents_dir, key)?;
    let factory = settings.factory();
    let agent = factory
        .from_yaml(&path)
        .context(format!("Failed to build agent '{}'", key))?;

    let runtime = tokio::runtime::Runtime::new().context("Failed to start async runtime")?;
    let response = runtime
        .block_on(agent.run(prompt))
        .context(format!("Agent '{}' failed", agent.name))?;

    println!("{}", response.content);
    if verbose {
        if !response.tool_calls.is_empty() {
            println!("{} {}", "Tools called:".dimmed(), response.tool_calls.join(", "));
        }
        println!(
            "{} {} rounds, {} tokens",
            "Usage:".dimmed(),
            response.rounds,
            response.usage.total()
        );
    }
    if response.hit_round_limit {
        println!("{}", "Stopped at the tool round limit".yellow());
    }
    Ok(())
}

fn build_agent(settings: &Settings, factory: &AgentFactory, key: &str) -> Result<Arc<Agent>> {
    let path = descriptor_path(&settings.agents_dir, key)?;
    let agent = factory
        .from_yaml(&path)
        .context(format!("Failed to build agent '{}'", key))?;
    Ok(Arc::new(agent))
}

fn handle_workflow(
    settings: &Settings,
    mode: WorkflowMode,
    prompt: &str,
    keys: &[String],
    synthesizer: Option<&str>,
    verbose: bool,
) -> Result<()> {
    let factory = settings.factory();
    let agents = keys
        .iter()
        .map(|key| build_agent(settings, &factory, key))
        .collect::<Result<Vec<_>>>()?;

    let runtime = tokio::runtime::Runtime::new().context("Failed to start async runtime")?;
    let output: WorkflowOutput = match mode {
        WorkflowMode::Sequential => {
            if synthesizer.is_some() {
                return Err(eyre!("--synthesizer only applies to concurrent workflows"));
            }
            let workflow = agents
                .into_iter()
                .fold(SequentialWorkflow::new("cli-sequential"), |w, agent| w.then(agent));
            runtime.block_on(workflow.run(prompt))
        }
        WorkflowMode::Concurrent => {
            let mut workflow = agents
                .into_iter()
                .fold(ConcurrentWorkflow::new("cli-concurrent"), |w, agent| w.participant(agent));
            if let Some(key) = synthesizer {
                workflow = workflow.with_synthesizer(build_agent(settings, &factory, key)?);
            }
            runtime.block_on(workflow.run(prompt))
        }
    }
    .context("Workflow failed")?;

    if verbose {
        for step in &output.steps {
            let marker = if step.is_success() { "ok".green() } else { "failed".red() };
            println!("{} {} [{}]", "Step:".dimmed(), step.agent, marker);
        }
        println!("{} {} tokens", "Usage:".dimmed(), output.usage.total());
    }
    println!("{}", output.output);
    Ok(())
}

fn main() -> Result<()> {
    // Parse CLI arguments
    let cli = Cli::parse();

    // Load configuration
    let config = Config::load(cli.config.as_ref()).context("Failed to load configuration")?;

    // Setup logging
    setup_logging(config.log_level.as_deref()).context("Failed to setup logging")?;

    info!("Starting with config from: {:?}", cli.config);

    // Run the main application logic
    run_application(&cli, &config).context("Application failed")?;

    Ok(())
}
