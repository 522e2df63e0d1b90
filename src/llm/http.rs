//! HTTP plumbing shared by the provider clients

use std::time::Duration;

use reqwest::header::{HeaderMap, RETRY_AFTER};
use reqwest::{Client, RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;

use crate::error::{Result, ToolbeltError};

/// Seconds to wait when a 429 carries no usable `retry-after`
const DEFAULT_RETRY_AFTER_SECS: u64 = 60;

pub(crate) fn build_client(timeout: Duration) -> Result<Client> {
    Client::builder()
        .timeout(timeout)
        .build()
        .map_err(|e| ToolbeltError::Llm(format!("Failed to create HTTP client: {}", e)))
}

/// Send a prepared request and decode a successful JSON body
pub(crate) async fn send_json<T: DeserializeOwned>(request: RequestBuilder) -> Result<T> {
    let response = request
        .send()
        .await
        .map_err(|e| ToolbeltError::Llm(format!("Request failed: {}", e)))?;

    let status = response.status();
    if !status.is_success() {
        let retry = retry_after(response.headers());
        let body = response.text().await.unwrap_or_default();
        return Err(status_error(status, retry, &body));
    }

    response
        .json()
        .await
        .map_err(|e| ToolbeltError::Llm(format!("Failed to parse response: {}", e)))
}

fn retry_after(headers: &HeaderMap) -> u64 {
    headers
        .get(RETRY_AFTER)
        .and_then(|h| h.to_str().ok())
        .and_then(|s| s.trim().parse::<u64>().ok())
        .unwrap_or(DEFAULT_RETRY_AFTER_SECS)
}

fn status_error(status: StatusCode, retry_after_secs: u64, body: &str) -> ToolbeltError {
    if status == StatusCode::TOO_MANY_REQUESTS {
        return ToolbeltError::Llm(format!("Rate limited, retry after {} seconds", retry_after_secs));
    }
    let body = body.trim();
    if body.is_empty() {
        ToolbeltError::Llm(format!("API error {}", status))
    } else {
        ToolbeltError::Llm(format!("API error {}: {}", status, body))
    }
}
