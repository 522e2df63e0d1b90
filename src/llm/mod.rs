//! Chat client layer
//!
//! This module provides:
//! - Provider-neutral message types
//! - The `ChatClient` trait and an offline mock
//! - Anthropic, OpenAI and Azure OpenAI clients over one HTTP helper
//! - Provider construction with ordered fallback

pub mod anthropic;
pub mod client;
mod http;
pub mod openai;
pub mod provider;
pub mod types;

pub use anthropic::{AnthropicClient, AnthropicConfig};
pub use client::{ChatClient, MockChatClient};
pub use openai::{AzureAuth, OpenAiClient, OpenAiTarget};
pub use provider::{CredentialType, ModelConfig, ProviderFactory, ProviderKind};
pub use types::{
    CompletionRequest, CompletionResponse, ContentBlock, Message, Role, StopReason, ToolCall, ToolDefinition,
    ToolResult, Usage,
};
