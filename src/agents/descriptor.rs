//! Agent descriptors - one YAML document per agent

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{Result, ToolbeltError};
use crate::llm::ModelConfig;

/// Declarative description of an agent
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AgentDescriptor {
    pub name: String,
    pub description: String,
    pub instructions: String,
    /// Domains pulled in wholesale, in this order
    #[serde(default)]
    pub tool_domains: Vec<String>,
    /// Extra tools matching any of these tags
    #[serde(default)]
    pub tool_tags: Option<Vec<String>>,
    /// Tool names removed after inclusion
    #[serde(default)]
    pub exclude_tools: Vec<String>,
    #[serde(default)]
    pub model: ModelConfig,
    /// Append generated tool docs to the instructions
    #[serde(default)]
    pub inject_tool_context: bool,
    /// Use the one-line-per-tool format when injecting
    #[serde(default)]
    pub compact_tool_context: bool,
    #[serde(default)]
    pub max_tool_rounds: Option<u32>,
}

impl AgentDescriptor {
    pub fn new(name: impl Into<String>, description: impl Into<String>, instructions: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            instructions: instructions.into(),
            ..Default::default()
        }
    }

    /// Parse and validate a descriptor from YAML text
    pub fn from_yaml(content: &str) -> Result<Self> {
        let descriptor: Self = serde_yaml::from_str(content)?;
        descriptor.validate()?;
        Ok(descriptor)
    }

    /// Read, parse and validate a descriptor file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)?;
        Self::from_yaml(&content).map_err(|e| match e {
            ToolbeltError::InvalidDescriptor(msg) => ToolbeltError::InvalidDescriptor(format!("{}: {}", path.display(), msg)),
            other => ToolbeltError::InvalidDescriptor(format!("{}: {}", path.display(), other)),
        })
    }

    /// Required fields must be present and non-blank
    pub fn validate(&self) -> Result<()> {
        let missing: Vec<&str> = [
            ("name", &self.name),
            ("description", &self.description),
            ("instructions", &self.instructions),
        ]
        .into_iter()
        .filter(|(_, value)| value.trim().is_empty())
        .map(|(field, _)| field)
        .collect();

        if !missing.is_empty() {
            return Err(ToolbeltError::InvalidDescriptor(format!(
                "missing required field(s): {}",
                missing.join(", ")
            )));
        }
        if self.max_tool_rounds == Some(0) {
            return Err(ToolbeltError::InvalidDescriptor(
                "max_tool_rounds must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    pub fn with_domains<I, S>(mut self, domains: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tool_domains = domains.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tool_tags = Some(tags.into_iter().map(Into::into).collect());
        self
    }

    pub fn with_excluded<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.exclude_tools = names.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_model(mut self, model: ModelConfig) -> Self {
        self.model = model;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    const WEATHER_AGENT: &str = r#"
name: WeatherAgent
description: Answers weather questions
instructions: |
  You are a helpful weather assistant.
tool_domains: [weather]
tool_tags: [forecast]
exclude_tools: [get_forecast]
model:
  providers: [azure_openai, mock]
inject_tool_context: true
"#;

    #[test]
    fn test_from_yaml_full() {
        let descriptor = AgentDescriptor::from_yaml(WEATHER_AGENT).unwrap();
        assert_eq!(descriptor.name, "WeatherAgent");
        assert_eq!(descriptor.tool_domains, vec!["weather"]);
        assert_eq!(descriptor.tool_tags, Some(vec!["forecast".to_string()]));
        assert_eq!(descriptor.exclude_tools, vec!["get_forecast"]);
        assert_eq!(descriptor.model.providers, vec!["azure_openai", "mock"]);
        assert!(descriptor.inject_tool_context);
        assert!(!descriptor.compact_tool_context);
        assert!(descriptor.instructions.starts_with("You are"));
    }

    #[test]
    fn test_optional_fields_default() {
        let descriptor = AgentDescriptor::from_yaml("name: a\ndescription: b\ninstructions: c\n").unwrap();
        assert!(descriptor.tool_domains.is_empty());
        assert!(descriptor.tool_tags.is_none());
        assert!(descriptor.exclude_tools.is_empty());
        assert_eq!(descriptor.model, ModelConfig::default());
        assert_eq!(descriptor.max_tool_rounds, None);
    }

    #[test]
    fn test_missing_field_is_yaml_error() {
        let result = AgentDescriptor::from_yaml("name: a\ndescription: b\n");
        assert!(matches!(result, Err(ToolbeltError::Yaml(_))));
    }

    #[test]
    fn test_blank_field_rejected() {
        let result = AgentDescriptor::from_yaml("name: a\ndescription: ''\ninstructions: '  '\n");
        let Err(ToolbeltError::InvalidDescriptor(msg)) = result else {
            panic!("expected InvalidDescriptor");
        };
        assert!(msg.contains("description"));
        assert!(msg.contains("instructions"));
        assert!(!msg.contains("name,"));
    }

    #[test]
    fn test_zero_rounds_rejected() {
        let descriptor = AgentDescriptor {
            max_tool_rounds: Some(0),
            ..AgentDescriptor::new("a", "b", "c")
        };
        assert!(descriptor.validate().is_err());
    }

    #[test]
    fn test_from_file() {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, "{}", WEATHER_AGENT).unwrap();
        let descriptor = AgentDescriptor::from_file(file.path()).unwrap();
        assert_eq!(descriptor.name, "WeatherAgent");
    }

    #[test]
    fn test_from_file_invalid_names_path() {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, "name: [unclosed").unwrap();
        let err = AgentDescriptor::from_file(file.path()).unwrap_err();
        assert!(matches!(err, ToolbeltError::InvalidDescriptor(_)));
        assert!(err.to_string().contains(&file.path().display().to_string()));
    }

    #[test]
    fn test_from_file_missing_is_io() {
        let err = AgentDescriptor::from_file("/nonexistent/agent.yaml").unwrap_err();
        assert!(matches!(err, ToolbeltError::Io(_)));
    }

    #[test]
    fn test_builders() {
        let descriptor = AgentDescriptor::new("a", "b", "c")
            .with_domains(["weather", "stock"])
            .with_tags(["price"])
            .with_excluded(["get_forecast"])
            .with_model(ModelConfig::with_provider("mock"));
        assert_eq!(descriptor.tool_domains, vec!["weather", "stock"]);
        assert_eq!(descriptor.model.provider.as_deref(), Some("mock"));
    }
}
