//! Tool trait and the closed tool registry.
//!
//! Tools are registered once, by name, before a conversation starts. The
//! registry cannot be changed after it is built.

use crate::error::{DocentError, Result};
use async_trait::async_trait;
use serde::Serialize;
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;

/// Failure reported by a tool. Always contained by the dispatcher.
#[derive(Error, Debug)]
pub enum ToolError {
    #[error("missing argument '{0}'")]
    MissingArgument(String),

    #[error("invalid argument '{name}': {reason}")]
    InvalidArgument { name: String, reason: String },

    #[error("timed out after {0}s")]
    Timeout(u64),

    #[error("{0}")]
    Failed(String),
}

impl From<DocentError> for ToolError {
    fn from(err: DocentError) -> Self {
        ToolError::Failed(err.to_string())
    }
}

/// A named capability the model can invoke.
#[async_trait]
pub trait Tool: Send + Sync {
    /// Unique tool name.
    fn name(&self) -> &str;

    /// Description shown to the model.
    fn description(&self) -> &str;

    /// JSON schema of the accepted arguments.
    fn parameters(&self) -> Value;

    /// Execute the tool.
    async fn invoke(&self, arguments: &Map<String, Value>) -> std::result::Result<String, ToolError>;
}

/// Model-facing description of a registered tool.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ToolDefinition {
    pub name: String,
    pub description: String,
    pub parameters: Value,
}

/// Result of looking a tool up by name.
pub enum ToolLookup<'a> {
    Found(&'a Arc<dyn Tool>),
    NotFound,
}

/// Immutable mapping from tool name to tool.
#[derive(Clone, Default)]
pub struct ToolRegistry {
    tools: HashMap<String, Arc<dyn Tool>>,
    /// Registration order, used for stable definitions.
    order: Vec<String>,
}

impl ToolRegistry {
    /// Start building a registry.
    pub fn builder() -> ToolRegistryBuilder {
        ToolRegistryBuilder::default()
    }

    /// Resolve a tool by name.
    pub fn lookup(&self, name: &str) -> ToolLookup<'_> {
        match self.tools.get(name) {
            Some(tool) => ToolLookup::Found(tool),
            None => ToolLookup::NotFound,
        }
    }

    /// Tool names in registration order.
    pub fn names(&self) -> &[String] {
        &self.order
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Definitions of all tools, in registration order.
    pub fn definitions(&self) -> Vec<ToolDefinition> {
        self.order
            .iter()
            .filter_map(|name| self.tools.get(name))
            .map(|tool| ToolDefinition {
                name: tool.name().to_string(),
                description: tool.description().to_string(),
                parameters: tool.parameters(),
            })
            .collect()
    }
}

impl std::fmt::Debug for ToolRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ToolRegistry").field("tools", &self.order).finish()
    }
}

/// Collects tools before the registry is closed.
#[derive(Default)]
pub struct ToolRegistryBuilder {
    tools: Vec<Arc<dyn Tool>>,
}

impl ToolRegistryBuilder {
    /// Register a tool.
    pub fn register<T: Tool + 'static>(self, tool: T) -> Self {
        self.register_arc(Arc::new(tool))
    }

    /// Register a shared tool.
    pub fn register_arc(mut self, tool: Arc<dyn Tool>) -> Self {
        self.tools.push(tool);
        self
    }

    /// Close the registry. Duplicate or empty names are configuration errors.
    pub fn build(self) -> Result<ToolRegistry> {
        let mut registry = ToolRegistry::default();

        for tool in self.tools {
            let name = tool.name().to_string();
            if name.trim().is_empty() {
                return Err(DocentError::Config("Tool name must not be empty".to_string()));
            }
            if registry.tools.contains_key(&name) {
                return Err(DocentError::DuplicateTool(name));
            }
            registry.order.push(name.clone());
            registry.tools.insert(name, tool);
        }

        Ok(registry)
    }
}

/// Read a required string argument.
pub fn required_str<'a>(
    arguments: &'a Map<String, Value>,
    name: &str,
) -> std::result::Result<&'a str, ToolError> {
    match arguments.get(name) {
        Some(Value::String(s)) => Ok(s.as_str()),
        Some(other) => Err(ToolError::InvalidArgument {
            name: name.to_string(),
            reason: format!("expected a string, got {}", other),
        }),
        None => Err(ToolError::MissingArgument(name.to_string())),
    }
}

/// Read an optional non-negative integer argument.
pub fn optional_u64(
    arguments: &Map<String, Value>,
    name: &str,
) -> std::result::Result<Option<u64>, ToolError> {
    match arguments.get(name) {
        None | Some(Value::Null) => Ok(None),
        Some(value) => value.as_u64().map(Some).ok_or_else(|| ToolError::InvalidArgument {
            name: name.to_string(),
            reason: format!("expected a non-negative integer, got {}", value),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::testing::{EchoTool, FailingTool};
    use serde_json::json;

    #[test]
    fn test_lookup_found_and_not_found() {
        let registry = ToolRegistry::builder().register(EchoTool).build().unwrap();

        assert!(matches!(registry.lookup("echo"), ToolLookup::Found(_)));
        assert!(matches!(registry.lookup("nonexistent"), ToolLookup::NotFound));
        assert_eq!(registry.names(), ["echo".to_string()]);
    }

    #[test]
    fn test_duplicate_names_rejected() {
        let err = ToolRegistry::builder()
            .register(EchoTool)
            .register(EchoTool)
            .build()
            .unwrap_err();

        assert!(matches!(err, DocentError::DuplicateTool(name) if name == "echo"));
    }

    #[test]
    fn test_definitions_follow_registration_order() {
        let registry = ToolRegistry::builder()
            .register(FailingTool)
            .register(EchoTool)
            .build()
            .unwrap();

        let names: Vec<String> = registry.definitions().into_iter().map(|d| d.name).collect();
        assert_eq!(names, vec!["fail", "echo"]);
    }

    #[test]
    fn test_argument_helpers() {
        let args = json!({"query": "pumps", "limit": 3, "bad": -1})
            .as_object()
            .cloned()
            .unwrap();

        assert_eq!(required_str(&args, "query").unwrap(), "pumps");
        assert!(matches!(
            required_str(&args, "missing"),
            Err(ToolError::MissingArgument(_))
        ));
        assert!(matches!(
            required_str(&args, "limit"),
            Err(ToolError::InvalidArgument { .. })
        ));
        assert_eq!(optional_u64(&args, "limit").unwrap(), Some(3));
        assert_eq!(optional_u64(&args, "absent").unwrap(), None);
        assert!(optional_u64(&args, "bad").is_err());
    }
}
