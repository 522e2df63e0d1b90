//! CLI command definitions using clap.
//!
//! - tools: list, summary, call
//! - agents: list, show
//! - run: send one prompt to an agent
//! - workflow: chain agents or run them side by side

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// Toolbelt - discover domain tools and assemble agents from YAML
#[derive(Parser, Debug)]
#[command(name = "toolbelt")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Optional config file path
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Suppress per-tool discovery logging
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Tools directory (overrides config)
    #[arg(long, global = true)]
    pub tools_dir: Option<PathBuf>,

    /// Agent descriptor directory (overrides config)
    #[arg(long, global = true)]
    pub agents_dir: Option<PathBuf>,

    /// Subcommand to execute (defaults to `tools summary`)
    #[command(subcommand)]
    pub command: Option<Commands>,
}

impl Cli {
    /// Check if verbose mode is enabled
    pub fn is_verbose(&self) -> bool {
        self.verbose
    }
}

/// Main subcommands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Inspect and call discovered tools
    Tools {
        #[command(subcommand)]
        command: ToolsCommands,
    },

    /// Inspect agent descriptors
    Agents {
        #[command(subcommand)]
        command: AgentsCommands,
    },

    /// Send one prompt to an agent and print the answer
    Run {
        /// Agent key (descriptor file stem)
        agent: String,

        /// Prompt text
        prompt: String,
    },

    /// Run several agents as one workflow
    Workflow {
        /// How the agents are combined
        #[arg(value_enum)]
        mode: WorkflowMode,

        /// Prompt text
        prompt: String,

        /// Agent keys in order (repeatable)
        #[arg(short, long = "agent", required = true)]
        agents: Vec<String>,

        /// Agent key that writes the final answer from concurrent results
        #[arg(short, long)]
        synthesizer: Option<String>,
    },
}

/// Workflow shapes
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkflowMode {
    /// Each agent receives the previous agent's answer
    Sequential,
    /// Every agent answers the prompt at the same time
    Concurrent,
}

/// Tool subcommands
#[derive(Subcommand, Debug, Clone)]
pub enum ToolsCommands {
    /// List tools, optionally filtered
    List {
        /// Only tools in this domain
        #[arg(short, long)]
        domain: Option<String>,

        /// Only tools with any of these tags (repeatable)
        #[arg(short, long = "tag")]
        tags: Vec<String>,

        /// Print JSON instead of a table
        #[arg(long)]
        json: bool,
    },

    /// Show totals per domain
    Summary {
        /// Print JSON instead of text
        #[arg(long)]
        json: bool,
    },

    /// Invoke one tool directly
    Call {
        /// Tool identifier, e.g. weather.get_weather
        tool_id: String,

        /// JSON object of arguments
        #[arg(short, long, default_value = "{}")]
        args: String,
    },
}

/// Agent subcommands
#[derive(Subcommand, Debug, Clone)]
pub enum AgentsCommands {
    /// List agent descriptors
    List,

    /// Build one agent and show its tools
    Show {
        /// Agent key (descriptor file stem)
        agent: String,
    },
}
