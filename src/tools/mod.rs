//! Tool contract, immutable registry, and builtin tools.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use crate::llm::tools::{ToolDefinition, ToolFunction, ToolParam};

/// Safe arithmetic evaluation.
pub mod calculator;
/// Local JSON calendar lookup.
pub mod calendar;
/// Document-retrieval tool adapter.
pub mod documents;
/// Weather lookup via Open-Meteo.
pub mod weather;
/// Web search via Tavily.
pub mod web_search;

/// Uniform capability every registered tool is adapted to.
///
/// `invoke` never fails: execution errors are captured and returned as the
/// result text, so the loop appends a result message for every call.
#[async_trait]
pub trait Tool: Send + Sync {
    fn name(&self) -> &str;
    fn description(&self) -> &str;
    fn params(&self) -> Vec<ToolParam>;
    async fn invoke(&self, args: &Value) -> String;

    fn definition(&self) -> ToolDefinition {
        let mut function = ToolFunction::new(self.name(), self.description());
        for param in self.params() {
            function = function.with_param(param);
        }
        ToolDefinition::from_function(function)
    }
}

pub type SharedTool = Arc<dyn Tool>;

#[derive(Debug, PartialEq, Eq)]
pub enum RegistryError {
    DuplicateTool(String),
    EmptyToolName,
}

impl fmt::Display for RegistryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::DuplicateTool(name) => {
                write!(f, "tool with name '{name}' already registered")
            }
            Self::EmptyToolName => write!(f, "tool name cannot be empty"),
        }
    }
}

impl std::error::Error for RegistryError {}

/// Named tool lookup, built once at startup and immutable thereafter.
///
/// The loop receives the registry by reference and dispatches on the single
/// `Tool` contract regardless of what each tool wraps.
pub struct ToolRegistry {
    tools: BTreeMap<String, SharedTool>,
}

impl ToolRegistry {
    pub fn from_tools(tools: Vec<SharedTool>) -> Result<Self, RegistryError> {
        let mut map = BTreeMap::new();
        for tool in tools {
            let name = tool.name().trim().to_string();
            if name.is_empty() {
                return Err(RegistryError::EmptyToolName);
            }
            if map.insert(name.clone(), tool).is_some() {
                return Err(RegistryError::DuplicateTool(name));
            }
        }
        Ok(Self { tools: map })
    }

    pub fn get(&self, name: &str) -> Option<&SharedTool> {
        self.tools.get(name)
    }

    pub fn definitions(&self) -> Vec<ToolDefinition> {
        self.tools.values().map(|tool| tool.definition()).collect()
    }

    pub fn tools(&self) -> impl Iterator<Item = &SharedTool> {
        self.tools.values()
    }

    pub fn names(&self) -> Vec<String> {
        self.tools.keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }
}

/// Extracts a required string argument from a tool-call payload.
///
/// A bare string payload is accepted as the value itself; models sometimes
/// send that instead of the declared object shape.
pub fn required_str_arg(args: &Value, key: &str) -> Result<String, String> {
    match args {
        Value::String(value) if !value.trim().is_empty() => Ok(value.clone()),
        _ => args
            .get(key)
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|value| !value.is_empty())
            .map(str::to_string)
            .ok_or_else(|| format!("missing required argument '{key}'")),
    }
}
