//! Chat client construction with ordered provider fallback
//!
//! A model block names one provider (`provider`) or an ordered list
//! (`providers`). Each candidate is tried in turn; construction failures are
//! configuration problems found at startup, so there is no backoff.

use std::fmt;
use std::process::Command;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Result, ToolbeltError};
use crate::llm::anthropic::{self, AnthropicClient, AnthropicConfig};
use crate::llm::client::{ChatClient, MockChatClient};
use crate::llm::openai::{AzureAuth, DEFAULT_OPENAI_MODEL, OpenAiClient, OpenAiTarget};

pub const AZURE_API_KEY_ENV: &str = "AZURE_OPENAI_API_KEY";
pub const AZURE_ENDPOINT_ENV: &str = "AZURE_OPENAI_ENDPOINT";
pub const AZURE_DEPLOYMENT_ENV: &str = "AZURE_OPENAI_DEPLOYMENT";
pub const OPENAI_API_KEY_ENV: &str = "OPENAI_API_KEY";
pub const ANTHROPIC_API_KEY_ENV: &str = "ANTHROPIC_API_KEY";

const AZURE_TOKEN_RESOURCE: &str = "https://cognitiveservices.azure.com";

const DEFAULT_MAX_TOKENS: u32 = 4096;
const DEFAULT_TIMEOUT_SECS: u64 = 120;

/// Known chat providers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderKind {
    AzureOpenAi,
    OpenAi,
    Anthropic,
    Mock,
}

impl ProviderKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderKind::AzureOpenAi => "azure_openai",
            ProviderKind::OpenAi => "openai",
            ProviderKind::Anthropic => "anthropic",
            ProviderKind::Mock => "mock",
        }
    }
}

impl FromStr for ProviderKind {
    type Err = ToolbeltError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "azure_openai" | "azure-openai" | "azure" => Ok(ProviderKind::AzureOpenAi),
            "openai" => Ok(ProviderKind::OpenAi),
            "anthropic" | "claude" => Ok(ProviderKind::Anthropic),
            "mock" => Ok(ProviderKind::Mock),
            other => Err(ToolbeltError::UnsupportedProvider(other.to_string())),
        }
    }
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How Azure requests authenticate
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CredentialType {
    #[default]
    ApiKey,
    AzureCli,
}

impl FromStr for CredentialType {
    type Err = ToolbeltError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "api_key" | "api-key" | "key" => Ok(CredentialType::ApiKey),
            "azure_cli" | "azure-cli" | "cli" => Ok(CredentialType::AzureCli),
            other => Err(ToolbeltError::UnsupportedCredential(other.to_string())),
        }
    }
}

/// The `model:` block of an agent descriptor
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelConfig {
    /// Single provider (legacy form)
    pub provider: Option<String>,
    /// Ordered candidates; wins over `provider`
    pub providers: Vec<String>,
    /// `api_key` or `azure_cli`
    pub credential_type: Option<String>,
    pub endpoint: Option<String>,
    pub deployment: Option<String>,
    pub model: Option<String>,
    #[serde(skip_serializing)]
    pub api_key: Option<String>,
    /// Environment variable to read the key from instead of the provider default
    pub api_key_env: Option<String>,
    pub max_tokens: Option<u32>,
    pub timeout_secs: Option<u64>,
}

impl ModelConfig {
    /// Model config pinned to one provider
    pub fn with_provider(provider: impl Into<String>) -> Self {
        Self {
            provider: Some(provider.into()),
            ..Default::default()
        }
    }

    /// Candidate provider names in the order they should be tried
    pub fn candidates(&self, default_provider: &str) -> Vec<String> {
        if !self.providers.is_empty() {
            self.providers.clone()
        } else if let Some(provider) = &self.provider {
            vec![provider.clone()]
        } else {
            vec![default_provider.to_string()]
        }
    }

    pub fn credential(&self) -> Result<CredentialType> {
        self.credential_type
            .as_deref()
            .map(CredentialType::from_str)
            .transpose()
            .map(Option::unwrap_or_default)
    }

    fn max_tokens(&self) -> u32 {
        self.max_tokens.unwrap_or(DEFAULT_MAX_TOKENS)
    }

    fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs.unwrap_or(DEFAULT_TIMEOUT_SECS))
    }
}

type EnvLookup = Arc<dyn Fn(&str) -> Option<String> + Send + Sync>;
type TokenSource = Arc<dyn Fn() -> Result<String> + Send + Sync>;

/// Builds chat clients from model configs
#[derive(Clone)]
pub struct ProviderFactory {
    env: EnvLookup,
    azure_token: TokenSource,
    default_provider: String,
}

impl Default for ProviderFactory {
    fn default() -> Self {
        Self::new()
    }
}

impl ProviderFactory {
    /// Factory reading the process environment and the Azure CLI
    pub fn new() -> Self {
        Self {
            env: Arc::new(|name: &str| std::env::var(name).ok().filter(|v| !v.is_empty())),
            azure_token: Arc::new(azure_cli_token),
            default_provider: ProviderKind::AzureOpenAi.as_str().to_string(),
        }
    }

    /// Replace the environment lookup
    pub fn with_env<F>(mut self, env: F) -> Self
    where
        F: Fn(&str) -> Option<String> + Send + Sync + 'static,
    {
        self.env = Arc::new(env);
        self
    }

    /// Replace the Azure CLI token source
    pub fn with_azure_token<F>(mut self, source: F) -> Self
    where
        F: Fn() -> Result<String> + Send + Sync + 'static,
    {
        self.azure_token = Arc::new(source);
        self
    }

    /// Provider tried when a model block names none
    pub fn with_default_provider(mut self, provider: impl Into<String>) -> Self {
        self.default_provider = provider.into();
        self
    }

    pub fn default_provider(&self) -> &str {
        &self.default_provider
    }

    /// Try each candidate in order and return the first client that builds
    pub fn build(&self, config: &ModelConfig) -> Result<Arc<dyn ChatClient>> {
        let candidates = config.candidates(&self.default_provider);
        let mut last_error = None;

        for candidate in &candidates {
            match self.build_one(candidate, config) {
                Ok(client) => {
                    log::info!("Using chat provider '{}' (model {})", client.provider(), client.model());
                    return Ok(client);
                }
                Err(e) => {
                    log::warn!("Provider '{}' unavailable: {}", candidate, e);
                    last_error = Some(e);
                }
            }
        }

        Err(last_error.unwrap_or_else(|| ToolbeltError::UnsupportedProvider("no providers configured".to_string())))
    }

    /// Build a client for exactly one provider name
    pub fn build_one(&self, provider: &str, config: &ModelConfig) -> Result<Arc<dyn ChatClient>> {
        match provider.parse::<ProviderKind>()? {
            ProviderKind::AzureOpenAi => self.build_azure(config),
            ProviderKind::OpenAi => self.build_openai(config),
            ProviderKind::Anthropic => self.build_anthropic(config),
            ProviderKind::Mock => {
                let model = config.model.clone().unwrap_or_else(|| "mock".to_string());
                Ok(Arc::new(MockChatClient::default().with_model(model)))
            }
        }
    }

    fn api_key(&self, config: &ModelConfig, default_env: &str) -> Result<String> {
        if let Some(key) = config.api_key.as_ref().filter(|k| !k.is_empty()) {
            return Ok(key.clone());
        }
        let env_var = config.api_key_env.as_deref().unwrap_or(default_env);
        (self.env)(env_var).ok_or_else(|| ToolbeltError::MissingCredential {
            env_var: env_var.to_string(),
        })
    }

    fn build_azure(&self, config: &ModelConfig) -> Result<Arc<dyn ChatClient>> {
        let endpoint = config
            .endpoint
            .clone()
            .or_else(|| (self.env)(AZURE_ENDPOINT_ENV))
            .ok_or_else(|| ToolbeltError::MissingCredential {
                env_var: AZURE_ENDPOINT_ENV.to_string(),
            })?;
        let deployment = config
            .deployment
            .clone()
            .or_else(|| config.model.clone())
            .or_else(|| (self.env)(AZURE_DEPLOYMENT_ENV))
            .ok_or_else(|| ToolbeltError::MissingCredential {
                env_var: AZURE_DEPLOYMENT_ENV.to_string(),
            })?;

        let auth = match config.credential()? {
            CredentialType::ApiKey => AzureAuth::ApiKey(self.api_key(config, AZURE_API_KEY_ENV)?),
            CredentialType::AzureCli => AzureAuth::BearerToken((self.azure_token)()?),
        };

        let model = config.model.clone().unwrap_or_else(|| deployment.clone());
        let target = OpenAiTarget::Azure {
            endpoint,
            deployment,
            auth,
        };
        Ok(Arc::new(OpenAiClient::new(target, model, config.max_tokens(), config.timeout())?))
    }

    fn build_openai(&self, config: &ModelConfig) -> Result<Arc<dyn ChatClient>> {
        let api_key = self.api_key(config, OPENAI_API_KEY_ENV)?;
        let model = config.model.clone().unwrap_or_else(|| DEFAULT_OPENAI_MODEL.to_string());
        let target = OpenAiTarget::OpenAi { api_key };
        Ok(Arc::new(OpenAiClient::new(target, model, config.max_tokens(), config.timeout())?))
    }

    fn build_anthropic(&self, config: &ModelConfig) -> Result<Arc<dyn ChatClient>> {
        let api_key = self.api_key(config, ANTHROPIC_API_KEY_ENV)?;
        let anthropic_config = AnthropicConfig {
            model: config.model.clone().unwrap_or_else(|| anthropic::DEFAULT_MODEL.to_string()),
            max_tokens: config.max_tokens(),
            timeout: config.timeout(),
        };
        Ok(Arc::new(AnthropicClient::with_api_key(api_key, anthropic_config)?))
    }
}

impl fmt::Debug for ProviderFactory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProviderFactory")
            .field("default_provider", &self.default_provider)
            .finish()
    }
}

/// Fetch an access token from a logged-in Azure CLI
fn azure_cli_token() -> Result<String> {
    let output = Command::new("az")
        .args([
            "account",
            "get-access-token",
            "--resource",
            AZURE_TOKEN_RESOURCE,
            "--query",
            "accessToken",
            "-o",
            "tsv",
        ])
        .output()
        .map_err(|e| ToolbeltError::Credential(format!("Failed to run az CLI: {}", e)))?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(ToolbeltError::Credential(format!(
            "az account get-access-token failed: {}",
            stderr.trim()
        )));
    }

    let token = String::from_utf8_lossy(&output.stdout).trim().to_string();
    if token.is_empty() {
        return Err(ToolbeltError::Credential("az CLI returned an empty token".to_string()));
    }
    Ok(token)
}
