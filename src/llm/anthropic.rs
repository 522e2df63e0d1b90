//! Anthropic Messages API client

use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::{Value, json};

use crate::error::{Result, ToolbeltError};
use crate::llm::client::ChatClient;
use crate::llm::http;
use crate::llm::types::{CompletionRequest, CompletionResponse, StopReason, ToolCall, Usage};

const ANTHROPIC_API_URL: &str = "https://api.anthropic.com/v1/messages";

const ANTHROPIC_VERSION: &str = "2023-06-01";

pub const DEFAULT_MODEL: &str = "claude-sonnet-4-20250514";

pub const DEFAULT_MAX_TOKENS: u32 = 4096;

/// Configuration for the Anthropic client
#[derive(Debug, Clone)]
pub struct AnthropicConfig {
    pub model: String,
    pub max_tokens: u32,
    pub timeout: Duration,
}

impl Default for AnthropicConfig {
    fn default() -> Self {
        Self {
            model: DEFAULT_MODEL.to_string(),
            max_tokens: DEFAULT_MAX_TOKENS,
            timeout: Duration::from_secs(120),
        }
    }
}

impl AnthropicConfig {
    pub fn with_model(model: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            ..Default::default()
        }
    }
}

/// Messages API response body, reduced to what agents consume
#[derive(Debug, Deserialize)]
struct MessagesResponse {
    content: Vec<ResponseBlock>,
    #[serde(default)]
    stop_reason: Option<String>,
    #[serde(default)]
    usage: Option<ResponseUsage>,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ResponseBlock {
    Text {
        text: String,
    },
    ToolUse {
        id: String,
        name: String,
        #[serde(default)]
        input: Value,
    },
    #[serde(other)]
    Other,
}

#[derive(Debug, Default, Deserialize)]
struct ResponseUsage {
    #[serde(default)]
    input_tokens: u64,
    #[serde(default)]
    output_tokens: u64,
}

/// Anthropic Messages API client
pub struct AnthropicClient {
    client: Client,
    api_key: String,
    config: AnthropicConfig,
    usage: Arc<Mutex<Usage>>,
}

impl AnthropicClient {
    pub fn with_api_key(api_key: impl Into<String>, config: AnthropicConfig) -> Result<Self> {
        Ok(Self {
            client: http::build_client(config.timeout)?,
            api_key: api_key.into(),
            config,
            usage: Arc::new(Mutex::new(Usage::default())),
        })
    }

    /// Neutral messages already serialize as Messages API content blocks
    fn build_request(&self, request: &CompletionRequest) -> Value {
        let mut body = json!({
            "model": self.config.model,
            "max_tokens": request.max_tokens.unwrap_or(self.config.max_tokens),
            "messages": request.messages,
        });

        if !request.system.is_empty() {
            body["system"] = json!(request.system);
        }
        if !request.tools.is_empty() {
            body["tools"] = request.tools.iter().map(|t| t.to_anthropic_schema()).collect();
        }
        body
    }

    fn parse_response(&self, body: Value) -> Result<CompletionResponse> {
        let parsed: MessagesResponse = serde_json::from_value(body)
            .map_err(|e| ToolbeltError::Llm(format!("Unexpected Messages API response: {}", e)))?;

        let usage = parsed
            .usage
            .map(|u| Usage::new(u.input_tokens, u.output_tokens))
            .unwrap_or_default();
        self.usage.lock().unwrap_or_else(PoisonError::into_inner).add(&usage);

        let mut texts = Vec::new();
        let mut tool_calls = Vec::new();
        for block in parsed.content {
            match block {
                ResponseBlock::Text { text } => texts.push(text),
                ResponseBlock::ToolUse { id, name, input } => tool_calls.push(ToolCall::new(id, name, input)),
                ResponseBlock::Other => {}
            }
        }

        Ok(CompletionResponse {
            content: texts.join("\n"),
            tool_calls,
            stop_reason: stop_reason(parsed.stop_reason.as_deref()),
            usage,
        })
    }

    /// Cumulative token usage across calls
    pub fn total_usage(&self) -> Usage {
        self.usage.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }
}

fn stop_reason(raw: Option<&str>) -> StopReason {
    match raw {
        Some("tool_use") => StopReason::ToolUse,
        Some("max_tokens") => StopReason::MaxTokens,
        Some("stop_sequence") => StopReason::StopSequence,
        _ => StopReason::EndTurn,
    }
}

#[async_trait]
impl ChatClient for AnthropicClient {
    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse> {
        let request = self
            .client
            .post(ANTHROPIC_API_URL)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .json(&self.build_request(&request));
        let body: Value = http::send_json(request).await?;
        self.parse_response(body)
    }

    fn provider(&self) -> &str {
        "anthropic"
    }

    fn model(&self) -> &str {
        &self.config.model
    }
}

impl std::fmt::Debug for AnthropicClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AnthropicClient")
            .field("model", &self.config.model)
            .field("max_tokens", &self.config.max_tokens)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::types::{Message, ToolDefinition, ToolResult};

    fn client() -> AnthropicClient {
        AnthropicClient::with_api_key("test-key", AnthropicConfig::default()).unwrap()
    }

    #[test]
    fn test_config_default() {
        let config = AnthropicConfig::default();
        assert_eq!(config.model, DEFAULT_MODEL);
        assert_eq!(config.max_tokens, DEFAULT_MAX_TOKENS);
    }

    #[test]
    fn test_config_with_model() {
        let config = AnthropicConfig::with_model("claude-3-haiku-20240307");
        assert_eq!(config.model, "claude-3-haiku-20240307");
    }

    #[test]
    fn test_build_request_basic() {
        let request = CompletionRequest::new("You are helpful").with_user_message("Hello");
        let body = client().build_request(&request);

        assert_eq!(body["model"], DEFAULT_MODEL);
        assert_eq!(body["max_tokens"], DEFAULT_MAX_TOKENS);
        assert_eq!(body["system"], "You are helpful");
        assert_eq!(body["messages"][0]["role"], "user");
        assert_eq!(body["messages"][0]["content"][0]["type"], "text");
        assert_eq!(body["messages"][0]["content"][0]["text"], "Hello");
        assert!(body.get("tools").is_none());
    }

    #[test]
    fn test_build_request_with_tools_and_results() {
        let tool = ToolDefinition::new("get_weather", "Weather", json!({"type": "object"}));
        let request = CompletionRequest::new("")
            .with_user_message("Weather?")
            .with_message(Message::tool_results(&[ToolResult::success("c1", "Sunny")]))
            .with_tools(vec![tool])
            .with_max_tokens(100);
        let body = client().build_request(&request);

        assert!(body.get("system").is_none());
        assert_eq!(body["max_tokens"], 100);
        assert_eq!(body["tools"][0]["name"], "get_weather");
        assert_eq!(body["messages"][1]["content"][0]["type"], "tool_result");
        assert_eq!(body["messages"][1]["content"][0]["tool_use_id"], "c1");
    }

    #[test]
    fn test_parse_response_text() {
        let client = client();
        let body = json!({
            "content": [{"type": "text", "text": "Hi"}, {"type": "text", "text": "there"}],
            "stop_reason": "end_turn",
            "usage": {"input_tokens": 10, "output_tokens": 4}
        });
        let response = client.parse_response(body).unwrap();
        assert_eq!(response.content, "Hi\nthere");
        assert_eq!(response.stop_reason, StopReason::EndTurn);
        assert_eq!(client.total_usage().total(), 14);
    }

    #[test]
    fn test_parse_response_tool_use() {
        let body = json!({
            "content": [{"type": "tool_use", "id": "toolu_1", "name": "get_weather", "input": {"location": "Paris"}}],
            "stop_reason": "tool_use"
        });
        let response = client().parse_response(body).unwrap();
        assert_eq!(response.stop_reason, StopReason::ToolUse);
        assert_eq!(response.tool_calls.len(), 1);
        assert_eq!(response.tool_calls[0].input["location"], "Paris");
    }

    #[test]
    fn test_parse_response_skips_unknown_blocks() {
        let body = json!({
            "content": [{"type": "thinking", "thinking": "..."}, {"type": "text", "text": "Done"}],
            "stop_reason": "end_turn"
        });
        let response = client().parse_response(body).unwrap();
        assert_eq!(response.content, "Done");
        assert!(response.tool_calls.is_empty());
    }

    #[test]
    fn test_parse_response_missing_content() {
        let result = client().parse_response(json!({"error": "bad"}));
        assert!(matches!(result, Err(ToolbeltError::Llm(_))));
    }

    #[test]
    fn test_provider_and_model() {
        let client = client();
        assert_eq!(client.provider(), "anthropic");
        assert_eq!(client.model(), DEFAULT_MODEL);
    }
}
