//! A constructed agent: instructions, resolved tools and a chat client

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::Arc;

use serde::Serialize;

use crate::error::Result;
use crate::llm::{ChatClient, CompletionRequest, Message, ToolCall, ToolDefinition, ToolResult, Usage};
use crate::tools::ToolEntry;

pub const DEFAULT_MAX_TOOL_ROUNDS: u32 = 8;

/// Outcome of one `Agent::run`
#[derive(Debug, Clone, Default, Serialize)]
pub struct AgentResponse {
    pub content: String,
    /// Names of tools invoked, in call order
    pub tool_calls: Vec<String>,
    pub rounds: u32,
    pub usage: Usage,
    /// The model still wanted tools when the round budget ran out
    pub hit_round_limit: bool,
}

pub struct Agent {
    pub name: String,
    pub description: String,
    pub instructions: String,
    pub tools: Vec<ToolEntry>,
    /// Name each tool is offered to the model under, parallel to `tools`
    exposed_names: Vec<String>,
    client: Arc<dyn ChatClient>,
    max_tool_rounds: u32,
}

/// Model-facing tool names, unique within one agent
///
/// Tools keep their own name unless another attached tool shares it; those
/// are offered as `{domain}_{name}` (plus a numeric suffix if that clashes too).
pub fn exposed_tool_names(tools: &[ToolEntry]) -> Vec<String> {
    let mut name_counts: HashMap<&str, usize> = HashMap::new();
    for entry in tools {
        *name_counts.entry(entry.metadata.name.as_str()).or_insert(0) += 1;
    }

    let mut taken: HashSet<String> = HashSet::new();
    let mut exposed = Vec::with_capacity(tools.len());
    for entry in tools {
        let name = &entry.metadata.name;
        let mut candidate = if name_counts[name.as_str()] > 1 {
            format!("{}_{}", entry.metadata.domain, name)
        } else {
            name.clone()
        };
        let base = candidate.clone();
        let mut suffix = 2;
        while taken.contains(&candidate) {
            candidate = format!("{}_{}", base, suffix);
            suffix += 1;
        }
        taken.insert(candidate.clone());
        exposed.push(candidate);
    }
    exposed
}

impl Agent {
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        instructions: impl Into<String>,
        tools: Vec<ToolEntry>,
        client: Arc<dyn ChatClient>,
    ) -> Self {
        let name = name.into();
        let exposed_names = exposed_tool_names(&tools);
        for (entry, exposed) in tools.iter().zip(&exposed_names) {
            if *exposed != entry.metadata.name {
                log::warn!(
                    "Agent '{}' has several tools named '{}'; offering {} as '{}'",
                    name,
                    entry.metadata.name,
                    entry.metadata.id(),
                    exposed
                );
            }
        }
        Self {
            name,
            description: description.into(),
            instructions: instructions.into(),
            tools,
            exposed_names,
            client,
            max_tool_rounds: DEFAULT_MAX_TOOL_ROUNDS,
        }
    }

    pub fn with_max_tool_rounds(mut self, rounds: u32) -> Self {
        self.max_tool_rounds = rounds.max(1);
        self
    }

    pub fn max_tool_rounds(&self) -> u32 {
        self.max_tool_rounds
    }

    pub fn client(&self) -> &Arc<dyn ChatClient> {
        &self.client
    }

    /// Model-facing tool names in attachment order
    pub fn tool_names(&self) -> Vec<&str> {
        self.exposed_names.iter().map(String::as_str).collect()
    }

    /// Definitions sent to the model
    pub fn tool_definitions(&self) -> Vec<ToolDefinition> {
        self.tools
            .iter()
            .zip(&self.exposed_names)
            .map(|(entry, exposed)| {
                let mut definition = entry.metadata.to_llm_definition();
                definition.name = exposed.clone();
                definition
            })
            .collect()
    }

    /// Execute one model-requested tool call
    pub fn call_tool(&self, call: &ToolCall) -> ToolResult {
        let found = self.exposed_names.iter().position(|n| *n == call.name);
        let Some(entry) = found.map(|i| &self.tools[i]) else {
            log::warn!("Agent '{}' was asked for unknown tool '{}'", self.name, call.name);
            return ToolResult::error(&call.id, format!("Unknown tool: {}", call.name));
        };

        log::debug!("Agent '{}' calling {} with {}", self.name, entry.metadata.id(), call.input);
        let output = entry.function.call(&call.input);
        if output.is_error {
            ToolResult::error(&call.id, output.content)
        } else {
            ToolResult::success(&call.id, output.content)
        }
    }

    /// Answer one prompt, looping through tool calls up to the round limit
    pub async fn run(&self, prompt: &str) -> Result<AgentResponse> {
        let definitions = self.tool_definitions();
        let mut messages = vec![Message::user(prompt)];
        let mut response = AgentResponse::default();

        loop {
            let request = CompletionRequest::new(&self.instructions)
                .with_messages(messages.clone())
                .with_tools(definitions.clone());
            let completion = self.client.complete(request).await?;
            response.rounds += 1;
            response.usage.add(&completion.usage);
            response.content = completion.content.clone();

            if !completion.stop_reason.needs_continuation() || completion.tool_calls.is_empty() {
                return Ok(response);
            }

            if response.rounds >= self.max_tool_rounds {
                log::warn!(
                    "Agent '{}' stopped after {} rounds with tool calls pending",
                    self.name,
                    response.rounds
                );
                response.hit_round_limit = true;
                return Ok(response);
            }

            let results: Vec<ToolResult> = completion
                .tool_calls
                .iter()
                .map(|call| {
                    response.tool_calls.push(call.name.clone());
                    self.call_tool(call)
                })
                .collect();

            messages.push(Message::assistant_tool_use(completion.content, &completion.tool_calls));
            messages.push(Message::tool_results(&results));
        }
    }
}

impl fmt::Debug for Agent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Agent")
            .field("name", &self.name)
            .field("tools", &self.tool_names())
            .field("provider", &self.client.provider())
            .field("model", &self.client.model())
            .finish()
    }
}
