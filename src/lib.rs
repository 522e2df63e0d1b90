//! Toolbelt - tool discovery and agent assembly for LLM agents
//!
//! Tools are compiled handlers exported by YAML manifests under a domain
//! directory tree. Discovery fills a registry indexed by domain and tag, and
//! agent descriptors pick tools from it by domain, tag and exclusion. Built
//! agents can be chained or run side by side as workflows.

pub mod agents;
pub mod builtin;
pub mod error;
pub mod llm;
pub mod tools;
pub mod workflow;

pub use error::{Result, ToolbeltError};
