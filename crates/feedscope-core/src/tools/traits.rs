use crate::error::FeedError;
use futures::FutureExt;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::fmt;
use std::panic::AssertUnwindSafe;

pub type ToolResult = Result<Value, FeedError>;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ToolDefinition {
    pub name: String,
    pub description: String,
    pub parameters: Value,
}

#[async_trait::async_trait]
pub trait Tool: Send + Sync {
    fn name(&self) -> &str;
    fn description(&self) -> &str;
    fn parameters_schema(&self) -> Value;

    async fn execute(&self, params: Value) -> ToolResult;

    fn to_definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: self.name().to_string(),
            description: self.description().to_string(),
            parameters: self.parameters_schema(),
        }
    }
}

/// A failed dispatch, in the `{"error": ...}` shape handed back to the model.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ToolFailure {
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub available_columns: Option<Vec<String>>,
}

impl ToolFailure {
    pub fn new(error: impl Into<String>) -> Self {
        Self {
            error: error.into(),
            available_columns: None,
        }
    }

    pub fn unknown_tool(name: &str) -> Self {
        Self::new(format!("Unknown tool: {name}"))
    }

    pub fn from_error(err: &FeedError) -> Self {
        match err {
            FeedError::Query(query) => Self {
                error: query.to_string(),
                available_columns: query.available_columns().map(<[String]>::to_vec),
            },
            other => Self::new(other.to_string()),
        }
    }

    pub fn into_value(self) -> Value {
        serde_json::to_value(&self).unwrap_or_else(|_| serde_json::json!({ "error": self.error }))
    }
}

impl fmt::Display for ToolFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.error)
    }
}

/// The static set of tools the model may call, keyed by name.
pub struct ToolRegistry {
    tools: HashMap<String, Box<dyn Tool>>,
    order: Vec<String>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self {
            tools: HashMap::new(),
            order: Vec::new(),
        }
    }

    /// Register a tool. A tool with the same name is replaced in place.
    pub fn register(&mut self, tool: Box<dyn Tool>) {
        let name = tool.name().to_string();
        if self.tools.insert(name.clone(), tool).is_none() {
            self.order.push(name);
        }
    }

    pub fn get(&self, name: &str) -> Option<&dyn Tool> {
        self.tools.get(name).map(|t| t.as_ref())
    }

    pub fn names(&self) -> &[String] {
        &self.order
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Tool schemas in registration order.
    pub fn definitions(&self) -> Vec<ToolDefinition> {
        self.order
            .iter()
            .filter_map(|name| self.tools.get(name))
            .map(|t| t.to_definition())
            .collect()
    }

    /// Run a tool by name. Never fails outward: unknown names, handler errors
    /// and handler panics all come back as a [`ToolFailure`].
    pub async fn dispatch(&self, name: &str, params: Value) -> Result<Value, ToolFailure> {
        let Some(tool) = self.get(name) else {
            tracing::warn!(tool = name, "unknown tool requested");
            return Err(ToolFailure::unknown_tool(name));
        };

        tracing::debug!(tool = name, %params, "dispatching tool");

        match AssertUnwindSafe(tool.execute(params)).catch_unwind().await {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(err)) => {
                tracing::warn!(tool = name, error = %err, "tool failed");
                Err(ToolFailure::from_error(&err))
            }
            Err(panic) => {
                let reason = panic
                    .downcast_ref::<&str>()
                    .map(|s| s.to_string())
                    .or_else(|| panic.downcast_ref::<String>().cloned())
                    .unwrap_or_else(|| "handler panicked".to_string());
                tracing::warn!(tool = name, %reason, "tool panicked");
                Err(ToolFailure::new(format!("Tool execution error: {reason}")))
            }
        }
    }
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::new()
    }
}
