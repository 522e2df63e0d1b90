//! Agent assembly
//!
//! Descriptor files name domains, tags and exclusions; the factory resolves
//! them against the tool registry and pairs the result with a chat client.

pub mod agent;
pub mod descriptor;
pub mod factory;
pub mod resolve;
pub mod tool_context;

pub use agent::{Agent, AgentResponse, DEFAULT_MAX_TOOL_ROUNDS, exposed_tool_names};
pub use descriptor::AgentDescriptor;
pub use factory::AgentFactory;
pub use resolve::{ResolvedToolSet, resolve_tools};
pub use tool_context::{generate_compact_context, generate_tool_context, inject_tool_context};
