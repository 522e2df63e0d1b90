//! Chat client trait and the offline mock
//!
//! Every provider is reached through `ChatClient`. The mock replays queued
//! responses and echoes the last user message once the queue is empty.

use std::collections::VecDeque;
use std::sync::{Mutex, PoisonError};

use async_trait::async_trait;

use crate::error::Result;
use crate::llm::types::{CompletionRequest, CompletionResponse};

/// Stateless chat-completion client
#[async_trait]
pub trait ChatClient: Send + Sync {
    /// Run one completion request
    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse>;

    /// Provider name (`anthropic`, `openai`, `azure_openai`, `mock`)
    fn provider(&self) -> &str;

    /// Model or deployment this client talks to
    fn model(&self) -> &str;
}

/// Offline client used for tests and for running without credentials
#[derive(Debug, Default)]
pub struct MockChatClient {
    model: String,
    responses: Mutex<VecDeque<CompletionResponse>>,
    requests: Mutex<Vec<CompletionRequest>>,
}

impl MockChatClient {
    /// Create a mock that replays `responses` in order
    pub fn new(responses: Vec<CompletionResponse>) -> Self {
        Self {
            model: "mock".to_string(),
            responses: Mutex::new(responses.into()),
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Override the reported model name
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    /// Queue another response
    pub fn push_response(&self, response: CompletionResponse) {
        self.responses
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push_back(response);
    }

    /// Requests seen so far
    pub fn requests(&self) -> Vec<CompletionRequest> {
        self.requests.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }
}

#[async_trait]
impl ChatClient for MockChatClient {
    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse> {
        let echo = request.last_user_text().unwrap_or_default();
        self.requests
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(request);

        let queued = self
            .responses
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .pop_front();
        Ok(queued.unwrap_or_else(|| CompletionResponse::text(format!("[mock] {}", echo))))
    }

    fn provider(&self) -> &str {
        "mock"
    }

    fn model(&self) -> &str {
        &self.model
    }
}
