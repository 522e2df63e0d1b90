//! Tool marking - metadata that travels with a callable
//!
//! A `ToolFn` is a shared handler plus what an annotation would read off a
//! function: its identifier, doc text and parameter signature. Marking attaches
//! `ToolMetadata` without touching the handler, so a marked and an unmarked copy
//! of the same `ToolFn` are still the same callable.

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::llm::ToolDefinition;

/// Signature every tool handler has: JSON object in, formatted text out
pub type Handler = dyn Fn(&Value) -> ToolOutput + Send + Sync;

/// Result of invoking a tool
///
/// Expected business failures ("symbol not found") are error outputs with a
/// readable message, not `Err`s.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolOutput {
    pub content: String,
    pub is_error: bool,
}

impl ToolOutput {
    pub fn success(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            is_error: false,
        }
    }

    pub fn error(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            is_error: true,
        }
    }
}

/// One parameter of a tool's signature
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolParam {
    pub name: String,
    #[serde(rename = "type")]
    pub param_type: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub required: bool,
}

impl ToolParam {
    pub fn required(name: impl Into<String>, param_type: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            param_type: param_type.into(),
            description: description.into(),
            required: true,
        }
    }

    pub fn optional(name: impl Into<String>, param_type: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            required: false,
            ..Self::required(name, param_type, description)
        }
    }
}

/// Metadata attached to a marked callable
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolMetadata {
    pub domain: String,
    pub name: String,
    pub description: String,
    pub tags: Vec<String>,
    pub mock: bool,
    pub requires_api_key: Option<String>,
    pub signature: Vec<ToolParam>,
    pub source_module: String,
}

impl ToolMetadata {
    /// Tool identifier, `"{domain}.{name}"`
    pub fn id(&self) -> String {
        format!("{}.{}", self.domain, self.name)
    }

    pub fn has_tag(&self, tag: &str) -> bool {
        self.tags.iter().any(|t| t == tag)
    }

    /// True if the tool carries at least one of `tags`
    pub fn has_any_tag<S: AsRef<str>>(&self, tags: &[S]) -> bool {
        tags.iter().any(|t| self.has_tag(t.as_ref()))
    }

    /// JSON schema for the captured signature
    pub fn input_schema(&self) -> Value {
        let mut properties = serde_json::Map::new();
        let mut required = Vec::new();
        for param in &self.signature {
            let mut prop = serde_json::Map::new();
            prop.insert("type".to_string(), Value::String(param.param_type.clone()));
            if !param.description.is_empty() {
                prop.insert("description".to_string(), Value::String(param.description.clone()));
            }
            properties.insert(param.name.clone(), Value::Object(prop));
            if param.required {
                required.push(Value::String(param.name.clone()));
            }
        }

        serde_json::json!({
            "type": "object",
            "properties": properties,
            "required": required
        })
    }

    /// Convert to LLM ToolDefinition for API calls
    pub fn to_llm_definition(&self) -> ToolDefinition {
        ToolDefinition::new(self.name.clone(), self.description.clone(), self.input_schema())
    }
}

/// Marking parameters: domain plus the optional overrides
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ToolSpec {
    pub domain: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub mock: bool,
    #[serde(default)]
    pub requires_api_key: Option<String>,
    #[serde(default)]
    pub source_module: Option<String>,
}

/// Start a marking spec for `domain`
pub fn tool(domain: impl Into<String>) -> ToolSpec {
    ToolSpec {
        domain: domain.into(),
        ..Default::default()
    }
}

impl ToolSpec {
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tags = tags.into_iter().map(Into::into).collect();
        self
    }

    pub fn mock(mut self, mock: bool) -> Self {
        self.mock = mock;
        self
    }

    pub fn requires_api_key(mut self, env_var: impl Into<String>) -> Self {
        self.requires_api_key = Some(env_var.into());
        self
    }

    pub fn source_module(mut self, module: impl Into<String>) -> Self {
        self.source_module = Some(module.into());
        self
    }
}

/// A callable tool handler with its identity and optional marking
#[derive(Clone)]
pub struct ToolFn {
    ident: String,
    doc: Option<String>,
    params: Vec<ToolParam>,
    handler: Arc<Handler>,
    metadata: Option<ToolMetadata>,
}

impl ToolFn {
    pub fn new<F>(ident: impl Into<String>, handler: F) -> Self
    where
        F: Fn(&Value) -> ToolOutput + Send + Sync + 'static,
    {
        Self {
            ident: ident.into(),
            doc: None,
            params: Vec::new(),
            handler: Arc::new(handler),
            metadata: None,
        }
    }

    /// Doc text, used as the description when marking omits one
    pub fn with_doc(mut self, doc: impl Into<String>) -> Self {
        self.doc = Some(doc.into());
        self
    }

    pub fn with_param(mut self, param: ToolParam) -> Self {
        self.params.push(param);
        self
    }

    pub fn ident(&self) -> &str {
        &self.ident
    }

    pub fn doc(&self) -> Option<&str> {
        self.doc.as_deref()
    }

    pub fn params(&self) -> &[ToolParam] {
        &self.params
    }

    /// Attach tool metadata, replacing any earlier marking
    pub fn mark(mut self, spec: ToolSpec) -> Self {
        let name = spec.name.unwrap_or_else(|| self.ident.clone());
        let description = spec
            .description
            .or_else(|| {
                self.doc
                    .as_deref()
                    .map(str::trim)
                    .filter(|d| !d.is_empty())
                    .map(str::to_string)
            })
            .unwrap_or_else(|| format!("{} function", self.ident));

        let mut tags: Vec<String> = Vec::with_capacity(spec.tags.len());
        for tag in spec.tags {
            if !tags.contains(&tag) {
                tags.push(tag);
            }
        }

        self.metadata = Some(ToolMetadata {
            domain: spec.domain,
            name,
            description,
            tags,
            mock: spec.mock,
            requires_api_key: spec.requires_api_key,
            signature: self.params.clone(),
            source_module: spec.source_module.unwrap_or_default(),
        });

        log::debug!("Marked tool: {} as '{}'", self.ident, self.id().unwrap_or_default());
        self
    }

    pub fn metadata(&self) -> Option<&ToolMetadata> {
        self.metadata.as_ref()
    }

    /// Tool identifier if marked
    pub fn id(&self) -> Option<String> {
        self.metadata.as_ref().map(ToolMetadata::id)
    }

    pub(crate) fn set_source_module(&mut self, module: impl Into<String>) {
        if let Some(metadata) = self.metadata.as_mut() {
            metadata.source_module = module.into();
        }
    }

    /// Whether both values wrap the same handler
    pub fn same_callable(&self, other: &ToolFn) -> bool {
        Arc::ptr_eq(&self.handler, &other.handler)
    }

    /// Invoke the handler after checking required parameters
    pub fn call(&self, args: &Value) -> ToolOutput {
        for param in self.params.iter().filter(|p| p.required) {
            if args.get(&param.name).is_none_or(Value::is_null) {
                return ToolOutput::error(format!(
                    "Tool '{}' missing required field: {}",
                    self.ident, param.name
                ));
            }
        }
        (self.handler)(args)
    }
}

impl fmt::Debug for ToolFn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ToolFn")
            .field("ident", &self.ident)
            .field("params", &self.params.len())
            .field("metadata", &self.metadata)
            .finish()
    }
}

/// Metadata of a callable, `None` if it was never marked
pub fn tool_metadata(func: &ToolFn) -> Option<&ToolMetadata> {
    func.metadata()
}

/// Whether a callable has been marked as a tool
pub fn is_tool(func: &ToolFn) -> bool {
    func.metadata.is_some()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn echo() -> ToolFn {
        ToolFn::new("echo", |args: &Value| {
            ToolOutput::success(args["text"].as_str().unwrap_or_default().to_string())
        })
        .with_param(ToolParam::required("text", "string", "Text to echo"))
    }

    #[test]
    fn test_unmarked_has_no_metadata() {
        let func = echo();
        assert!(!is_tool(&func));
        assert!(tool_metadata(&func).is_none());
        assert!(func.id().is_none());
    }

    #[test]
    fn test_mark_defaults_name_to_ident() {
        let func = echo().mark(tool("util"));
        let metadata = tool_metadata(&func).unwrap();
        assert_eq!(metadata.name, "echo");
        assert_eq!(metadata.domain, "util");
        assert_eq!(metadata.id(), "util.echo");
    }

    #[test]
    fn test_mark_description_from_doc_trimmed() {
        let func = echo().with_doc("\n   Echo the input back.\n  ").mark(tool("util"));
        assert_eq!(func.metadata().unwrap().description, "Echo the input back.");
    }

    #[test]
    fn test_mark_description_synthesized_without_doc() {
        let func = echo().mark(tool("util"));
        assert_eq!(func.metadata().unwrap().description, "echo function");
    }

    #[test]
    fn test_mark_explicit_overrides() {
        let func = echo().with_doc("ignored").mark(
            tool("util")
                .name("say")
                .description("Say something")
                .tags(["text", "debug"])
                .mock(true)
                .requires_api_key("ECHO_KEY"),
        );
        let metadata = func.metadata().unwrap();
        assert_eq!(metadata.name, "say");
        assert_eq!(metadata.description, "Say something");
        assert_eq!(metadata.tags, vec!["text", "debug"]);
        assert!(metadata.mock);
        assert_eq!(metadata.requires_api_key.as_deref(), Some("ECHO_KEY"));
    }

    #[test]
    fn test_mark_dedupes_tags() {
        let func = echo().mark(tool("util").tags(["a", "b", "a"]));
        assert_eq!(func.metadata().unwrap().tags, vec!["a", "b"]);
    }

    #[test]
    fn test_mark_twice_overwrites() {
        let func = echo().mark(tool("util").name("first")).mark(tool("other").name("second"));
        assert_eq!(func.id().as_deref(), Some("other.second"));
    }

    #[test]
    fn test_mark_preserves_callable() {
        let plain = echo();
        let marked = plain.clone().mark(tool("util"));
        assert!(plain.same_callable(&marked));
        assert!(!plain.same_callable(&echo()));

        let args = serde_json::json!({"text": "hi"});
        assert_eq!(plain.call(&args), marked.call(&args));
    }

    #[test]
    fn test_call_missing_required_param() {
        let result = echo().call(&serde_json::json!({}));
        assert!(result.is_error);
        assert!(result.content.contains("missing required field: text"));
    }

    #[test]
    fn test_call_null_required_param() {
        let result = echo().call(&serde_json::json!({"text": null}));
        assert!(result.is_error);
    }

    #[test]
    fn test_signature_captured_into_schema() {
        let func = ToolFn::new("get_forecast", |_: &Value| ToolOutput::success("ok"))
            .with_param(ToolParam::required("location", "string", "Where"))
            .with_param(ToolParam::optional("days", "integer", "How many days"))
            .mark(tool("weather"));

        let schema = func.metadata().unwrap().input_schema();
        assert_eq!(schema["type"], "object");
        assert_eq!(schema["properties"]["location"]["type"], "string");
        assert_eq!(schema["properties"]["days"]["type"], "integer");
        let required = schema["required"].as_array().unwrap();
        assert_eq!(required.len(), 1);
        assert_eq!(required[0], "location");
    }

    #[test]
    fn test_to_llm_definition() {
        let func = echo().mark(tool("util").description("Echo"));
        let def = func.metadata().unwrap().to_llm_definition();
        assert_eq!(def.name, "echo");
        assert_eq!(def.description, "Echo");
        assert!(def.input_schema["properties"]["text"].is_object());
    }

    #[test]
    fn test_has_any_tag() {
        let func = echo().mark(tool("util").tags(["x", "y"]));
        let metadata = func.metadata().unwrap();
        assert!(metadata.has_any_tag(&["z", "y"]));
        assert!(!metadata.has_any_tag(&["z"]));
        assert!(!metadata.has_any_tag::<&str>(&[]));
    }

    #[test]
    fn test_tool_spec_deserialize() {
        let yaml = "domain: stock\ntags: [price]\nmock: true\n";
        let spec: ToolSpec = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(spec.domain, "stock");
        assert_eq!(spec.tags, vec!["price"]);
        assert!(spec.mock);
        assert!(spec.name.is_none());
    }

    #[test]
    fn test_tool_spec_rejects_unknown_fields() {
        let yaml = "domain: stock\ncolour: blue\n";
        assert!(serde_yaml::from_str::<ToolSpec>(yaml).is_err());
    }
}
