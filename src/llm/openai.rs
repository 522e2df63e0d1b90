//! OpenAI and Azure OpenAI chat-completions client
//!
//! Both services speak the same wire format; they differ only in URL shape
//! and authentication header.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder};
use serde_json::{Value, json};

use crate::error::{Result, ToolbeltError};
use crate::llm::client::ChatClient;
use crate::llm::http;
use crate::llm::types::{CompletionRequest, CompletionResponse, ContentBlock, Message, Role, StopReason, ToolCall, Usage};

const OPENAI_API_URL: &str = "https://api.openai.com/v1/chat/completions";

pub const AZURE_API_VERSION: &str = "2024-10-21";

pub const DEFAULT_OPENAI_MODEL: &str = "gpt-4o";

/// Where requests go and how they authenticate
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OpenAiTarget {
    /// api.openai.com with a bearer API key
    OpenAi { api_key: String },
    /// An Azure OpenAI deployment
    Azure {
        endpoint: String,
        deployment: String,
        auth: AzureAuth,
    },
}

/// Azure authentication material
#[derive(Clone, PartialEq, Eq)]
pub enum AzureAuth {
    ApiKey(String),
    BearerToken(String),
}

impl std::fmt::Debug for AzureAuth {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AzureAuth::ApiKey(_) => f.write_str("ApiKey(..)"),
            AzureAuth::BearerToken(_) => f.write_str("BearerToken(..)"),
        }
    }
}

/// Chat-completions client for OpenAI or Azure OpenAI
pub struct OpenAiClient {
    client: Client,
    target: OpenAiTarget,
    model: String,
    max_tokens: u32,
}

impl OpenAiClient {
    pub fn new(target: OpenAiTarget, model: impl Into<String>, max_tokens: u32, timeout: Duration) -> Result<Self> {
        Ok(Self {
            client: http::build_client(timeout)?,
            target,
            model: model.into(),
            max_tokens,
        })
    }

    fn url(&self) -> String {
        match &self.target {
            OpenAiTarget::OpenAi { .. } => OPENAI_API_URL.to_string(),
            OpenAiTarget::Azure { endpoint, deployment, .. } => format!(
                "{}/openai/deployments/{}/chat/completions?api-version={}",
                endpoint.trim_end_matches('/'),
                deployment,
                AZURE_API_VERSION
            ),
        }
    }

    fn build_request(&self, request: &CompletionRequest) -> Value {
        let mut messages = Vec::new();
        if !request.system.is_empty() {
            messages.push(json!({"role": "system", "content": request.system}));
        }
        for message in &request.messages {
            messages.extend(convert_message(message));
        }

        let mut body = json!({
            "messages": messages,
            "max_tokens": request.max_tokens.unwrap_or(self.max_tokens),
        });

        // Azure routes by deployment; the model field is only sent to OpenAI
        if matches!(self.target, OpenAiTarget::OpenAi { .. }) {
            body["model"] = json!(self.model);
        }

        if !request.tools.is_empty() {
            let tools: Vec<Value> = request.tools.iter().map(|t| t.to_openai_schema()).collect();
            body["tools"] = json!(tools);
        }

        body
    }

    fn parse_response(&self, body: Value) -> Result<CompletionResponse> {
        let Some(choice) = body["choices"].get(0) else {
            return Err(ToolbeltError::Llm("Response has no choices".to_string()));
        };
        let message = &choice["message"];

        let stop_reason = match choice["finish_reason"].as_str() {
            Some("tool_calls") => StopReason::ToolUse,
            Some("length") => StopReason::MaxTokens,
            _ => StopReason::EndTurn,
        };

        let mut tool_calls = Vec::new();
        if let Some(calls) = message["tool_calls"].as_array() {
            for call in calls {
                let id = call["id"].as_str().unwrap_or("").to_string();
                let name = call["function"]["name"].as_str().unwrap_or("").to_string();
                let raw = call["function"]["arguments"].as_str().unwrap_or("{}");
                let input = serde_json::from_str(raw).unwrap_or_else(|e| {
                    log::warn!("Tool call '{}' has unparseable arguments: {}", name, e);
                    json!({})
                });
                tool_calls.push(ToolCall::new(id, name, input));
            }
        }

        let usage = body
            .get("usage")
            .map(|u| {
                Usage::new(
                    u["prompt_tokens"].as_u64().unwrap_or(0),
                    u["completion_tokens"].as_u64().unwrap_or(0),
                )
            })
            .unwrap_or_default();

        Ok(CompletionResponse {
            content: message["content"].as_str().unwrap_or("").to_string(),
            tool_calls,
            stop_reason,
            usage,
        })
    }

    fn authorize(&self, builder: RequestBuilder) -> RequestBuilder {
        match &self.target {
            OpenAiTarget::OpenAi { api_key } => builder.bearer_auth(api_key),
            OpenAiTarget::Azure {
                auth: AzureAuth::ApiKey(key),
                ..
            } => builder.header("api-key", key),
            OpenAiTarget::Azure {
                auth: AzureAuth::BearerToken(token),
                ..
            } => builder.bearer_auth(token),
        }
    }
}

/// One neutral message can expand to several chat-completions messages
fn convert_message(message: &Message) -> Vec<Value> {
    match message.role {
        Role::Assistant => {
            let calls: Vec<Value> = message
                .content
                .iter()
                .filter_map(|b| match b {
                    ContentBlock::ToolUse { id, name, input } => Some(json!({
                        "id": id,
                        "type": "function",
                        "function": {"name": name, "arguments": input.to_string()}
                    })),
                    _ => None,
                })
                .collect();
            let text = message.text();
            let mut value = json!({"role": "assistant"});
            value["content"] = if text.is_empty() && !calls.is_empty() {
                Value::Null
            } else {
                json!(text)
            };
            if !calls.is_empty() {
                value["tool_calls"] = json!(calls);
            }
            vec![value]
        }
        Role::User => {
            let mut out = Vec::new();
            for block in &message.content {
                if let ContentBlock::ToolResult {
                    tool_use_id, content, ..
                } = block
                {
                    out.push(json!({"role": "tool", "tool_call_id": tool_use_id, "content": content}));
                }
            }
            let text = message.text();
            if !text.is_empty() || out.is_empty() {
                out.push(json!({"role": "user", "content": text}));
            }
            out
        }
    }
}

#[async_trait]
impl ChatClient for OpenAiClient {
    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse> {
        let request = self.authorize(self.client.post(self.url())).json(&self.build_request(&request));
        let body: Value = http::send_json(request).await?;
        self.parse_response(body)
    }

    fn provider(&self) -> &str {
        match self.target {
            OpenAiTarget::OpenAi { .. } => "openai",
            OpenAiTarget::Azure { .. } => "azure_openai",
        }
    }

    fn model(&self) -> &str {
        &self.model
    }
}

impl std::fmt::Debug for OpenAiClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenAiClient")
            .field("provider", &self.provider())
            .field("model", &self.model)
            .field("max_tokens", &self.max_tokens)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::types::{ToolDefinition, ToolResult};

    fn openai() -> OpenAiClient {
        OpenAiClient::new(
            OpenAiTarget::OpenAi {
                api_key: "sk-test".to_string(),
            },
            DEFAULT_OPENAI_MODEL,
            1024,
            Duration::from_secs(30),
        )
        .unwrap()
    }

    fn azure() -> OpenAiClient {
        OpenAiClient::new(
            OpenAiTarget::Azure {
                endpoint: "https://example.openai.azure.com/".to_string(),
                deployment: "gpt-4o-mini".to_string(),
                auth: AzureAuth::ApiKey("key".to_string()),
            },
            "gpt-4o-mini",
            1024,
            Duration::from_secs(30),
        )
        .unwrap()
    }

    #[test]
    fn test_urls() {
        assert_eq!(openai().url(), OPENAI_API_URL);
        assert_eq!(
            azure().url(),
            format!(
                "https://example.openai.azure.com/openai/deployments/gpt-4o-mini/chat/completions?api-version={}",
                AZURE_API_VERSION
            )
        );
    }

    #[test]
    fn test_provider_names() {
        assert_eq!(openai().provider(), "openai");
        assert_eq!(azure().provider(), "azure_openai");
    }

    #[test]
    fn test_build_request_system_first() {
        let request = CompletionRequest::new("Be brief").with_user_message("Hi");
        let body = openai().build_request(&request);
        assert_eq!(body["model"], DEFAULT_OPENAI_MODEL);
        assert_eq!(body["messages"][0]["role"], "system");
        assert_eq!(body["messages"][1]["role"], "user");
        assert_eq!(body["messages"][1]["content"], "Hi");
    }

    #[test]
    fn test_azure_request_has_no_model() {
        let body = azure().build_request(&CompletionRequest::new("").with_user_message("Hi"));
        assert!(body.get("model").is_none());
        assert_eq!(body["messages"][0]["role"], "user");
    }

    #[test]
    fn test_build_request_tool_round_trip() {
        let calls = vec![ToolCall::new("call_1", "get_weather", json!({"location": "Oslo"}))];
        let request = CompletionRequest::new("")
            .with_user_message("Weather?")
            .with_message(Message::assistant_tool_use("", &calls))
            .with_message(Message::tool_results(&[ToolResult::success("call_1", "Cold")]))
            .with_tools(vec![ToolDefinition::new("get_weather", "Weather", json!({"type": "object"}))]);
        let body = openai().build_request(&request);

        let messages = body["messages"].as_array().unwrap();
        assert_eq!(messages.len(), 3);
        assert!(messages[1]["content"].is_null());
        assert_eq!(messages[1]["tool_calls"][0]["function"]["name"], "get_weather");
        assert_eq!(messages[1]["tool_calls"][0]["function"]["arguments"], "{\"location\":\"Oslo\"}");
        assert_eq!(messages[2]["role"], "tool");
        assert_eq!(messages[2]["tool_call_id"], "call_1");
        assert_eq!(body["tools"][0]["type"], "function");
    }

    #[test]
    fn test_parse_response_text() {
        let body = json!({
            "choices": [{"message": {"role": "assistant", "content": "Hello"}, "finish_reason": "stop"}],
            "usage": {"prompt_tokens": 5, "completion_tokens": 2}
        });
        let response = openai().parse_response(body).unwrap();
        assert_eq!(response.content, "Hello");
        assert_eq!(response.stop_reason, StopReason::EndTurn);
        assert_eq!(response.usage.total(), 7);
    }

    #[test]
    fn test_parse_response_tool_calls() {
        let body = json!({
            "choices": [{
                "message": {
                    "content": null,
                    "tool_calls": [{
                        "id": "call_9",
                        "type": "function",
                        "function": {"name": "get_stock_price", "arguments": "{\"symbol\":\"MSFT\"}"}
                    }]
                },
                "finish_reason": "tool_calls"
            }]
        });
        let response = openai().parse_response(body).unwrap();
        assert_eq!(response.stop_reason, StopReason::ToolUse);
        assert_eq!(response.content, "");
        assert_eq!(response.tool_calls[0].input["symbol"], "MSFT");
    }

    #[test]
    fn test_parse_response_bad_arguments() {
        let body = json!({
            "choices": [{
                "message": {"tool_calls": [{"id": "c", "function": {"name": "x", "arguments": "not json"}}]},
                "finish_reason": "tool_calls"
            }]
        });
        let response = openai().parse_response(body).unwrap();
        assert_eq!(response.tool_calls[0].input, json!({}));
    }

    #[test]
    fn test_parse_response_no_choices() {
        assert!(matches!(openai().parse_response(json!({})), Err(ToolbeltError::Llm(_))));
    }

    #[test]
    fn test_azure_auth_debug_hides_secret() {
        let debug = format!("{:?}", AzureAuth::ApiKey("secret".to_string()));
        assert!(!debug.contains("secret"));
    }
}
