//! CLI module for toolbelt - command-line interface and subcommands.
//!
//! Provides subcommands for inspecting the tool registry, listing agents and
//! running a single prompt through an agent.

pub mod commands;

pub use commands::Cli;
