//! Tool system - marking, discovery and the registry
//!
//! Tools live in domain directories as YAML manifests that export compiled
//! handlers. The loader walks the tree, the registry indexes what it finds.

mod handlers;
mod loader;
mod marker;
mod registry;

pub use handlers::HandlerTable;
pub use loader::{Discovery, DiscoveryReport, FailedModule, LoadedModule, QUIET_ENV, ToolLoader, quiet_from_env};
pub use marker::{Handler, ToolFn, ToolMetadata, ToolOutput, ToolParam, ToolSpec, is_tool, tool, tool_metadata};
pub use registry::{RegistrySummary, ToolEntry, ToolRegistry};
