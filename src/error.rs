//! Error types for Toolbelt
//!
//! Centralized error handling using thiserror.

use std::path::PathBuf;

use thiserror::Error;

/// All error types that can occur in Toolbelt
#[derive(Debug, Error)]
pub enum ToolbeltError {
    /// Tool identifier not present in the registry
    #[error("Tool not found: {0}")]
    ToolNotFound(String),

    /// Empty or malformed tool identifier
    #[error("Invalid tool identifier: {0:?}")]
    InvalidIdentifier(String),

    /// Callable carries no tool metadata
    #[error("Not a tool: {0}")]
    NotATool(String),

    /// A tool module could not be loaded
    #[error("Failed to load module {path}: {reason}")]
    ModuleLoad { path: PathBuf, reason: String },

    /// A manifest referenced a handler that is not compiled in
    #[error("Unknown handler: {0}")]
    UnknownHandler(String),

    /// Agent descriptor is missing fields or malformed
    #[error("Invalid agent descriptor: {0}")]
    InvalidDescriptor(String),

    /// Provider name not recognized
    #[error("Unsupported provider: {0}")]
    UnsupportedProvider(String),

    /// Credential type not recognized
    #[error("Unsupported credential type: {0}")]
    UnsupportedCredential(String),

    /// Required credential not configured
    #[error("Missing credential: environment variable {env_var} not set")]
    MissingCredential { env_var: String },

    /// Credential could not be obtained
    #[error("Credential error: {0}")]
    Credential(String),

    /// Workflow could not run
    #[error("Workflow error: {0}")]
    Workflow(String),

    /// LLM API error
    #[error("LLM error: {0}")]
    Llm(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// YAML deserialization error
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

/// Result type alias for Toolbelt operations
pub type Result<T> = std::result::Result<T, ToolbeltError>;
