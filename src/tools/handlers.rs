//! Handler table - the compiled callables tool manifests can export
//!
//! Manifests never carry code; they name handlers from this table. The table
//! is the static plugin index: anything not registered here cannot be loaded.

use std::collections::HashMap;

use super::marker::ToolFn;

/// Compiled tool callables keyed by handler name
#[derive(Debug, Clone, Default)]
pub struct HandlerTable {
    handlers: HashMap<String, ToolFn>,
}

impl HandlerTable {
    /// Create an empty table (for custom handler sets)
    pub fn new() -> Self {
        Self::default()
    }

    /// Table with every built-in domain tool
    pub fn builtin() -> Self {
        let mut table = Self::new();
        crate::builtin::register_all(&mut table);
        table
    }

    /// Add a handler under its identifier, replacing any previous one
    pub fn register(&mut self, function: ToolFn) {
        if let Some(previous) = self.handlers.insert(function.ident().to_string(), function) {
            log::warn!("Handler '{}' registered twice, keeping the newer one", previous.ident());
        }
    }

    pub fn get(&self, name: &str) -> Option<&ToolFn> {
        self.handlers.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.handlers.contains_key(name)
    }

    /// Handler names, sorted
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.handlers.keys().map(|s| s.as_str()).collect();
        names.sort_unstable();
        names
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }
}
