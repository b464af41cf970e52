//! Tool system for the agent.
//!
//! Tools are the agent's only way to touch workbooks. Each tool declares an
//! ordered parameter list that is rendered into the system prompt, and
//! receives the model's keyword arguments as a JSON object.

mod analyzer;
mod check;
mod code;
mod formatter;
mod reader;
mod writer;

use std::path::PathBuf;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use thiserror::Error;

use crate::config::Config;
use crate::sheet::SheetError;

pub use code::RunPython;

#[derive(Debug, Error)]
pub enum ToolError {
    #[error("unknown tool: {name}. Available tools: {}", .available.join(", "))]
    UnknownTool { name: String, available: Vec<String> },

    #[error("tool already registered: {0}")]
    Duplicate(String),

    #[error("invalid arguments for {tool}: {source}")]
    InvalidArguments {
        tool: String,
        #[source]
        source: serde_json::Error,
    },

    #[error(transparent)]
    Sheet(#[from] SheetError),

    #[error("{0}")]
    Execution(String),
}

/// What a tool hands back to the loop.
#[derive(Debug, Clone, PartialEq)]
pub enum ToolOutput {
    Text(String),
    Json(Value),
}

impl ToolOutput {
    /// Text as-is; JSON pretty-printed with non-ASCII characters kept.
    pub fn render(&self) -> String {
        match self {
            Self::Text(text) => text.clone(),
            Self::Json(value) => {
                serde_json::to_string_pretty(value).unwrap_or_else(|_| value.to_string())
            }
        }
    }
}

/// A capability the agent can invoke by name.
#[async_trait]
pub trait Tool: Send + Sync {
    /// Unique name used in tool calls.
    fn name(&self) -> &str;

    /// One-line description shown to the model.
    fn description(&self) -> &str;

    /// Declared parameter names, in prompt order.
    fn params(&self) -> &[&str];

    /// Execute with the model's keyword arguments.
    async fn execute(&self, args: Map<String, Value>) -> Result<ToolOutput, ToolError>;
}

/// Ordered set of tools. Built once at start-up and shared read-only.
pub struct ToolRegistry {
    tools: Vec<Box<dyn Tool>>,
}

impl ToolRegistry {
    /// An empty registry.
    pub fn new() -> Self {
        Self { tools: Vec::new() }
    }

    /// The standard spreadsheet tool set.
    pub fn spreadsheet(config: &Config) -> Self {
        let tools: Vec<Box<dyn Tool>> = vec![
            Box::new(reader::ReadExcel),
            Box::new(reader::ReadFormulas),
            Box::new(reader::GetSummary),
            Box::new(writer::CreateWorkbook),
            Box::new(writer::WriteCells),
            Box::new(formatter::ApplyNumberFormat),
            Box::new(formatter::SetColumnWidths),
            Box::new(formatter::AutoFit),
            Box::new(formatter::ApplyHeaderStyle),
            Box::new(formatter::AddBorders),
            Box::new(analyzer::AnalyzeData),
            Box::new(analyzer::CreateChart),
            Box::new(check::CheckFormulas),
            Box::new(RunPython::from_config(config)),
        ];
        Self { tools }
    }

    /// Add a tool. Names must be unique.
    pub fn register<T: Tool + 'static>(&mut self, tool: T) -> Result<(), ToolError> {
        if self.get(tool.name()).is_some() {
            return Err(ToolError::Duplicate(tool.name().to_string()));
        }
        self.tools.push(Box::new(tool));
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&dyn Tool> {
        self.tools
            .iter()
            .find(|t| t.name() == name)
            .map(|t| t.as_ref())
    }

    pub fn names(&self) -> Vec<String> {
        self.tools.iter().map(|t| t.name().to_string()).collect()
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    /// `name(p1, p2): description`, one line per tool, in registration order.
    pub fn describe(&self) -> String {
        self.tools
            .iter()
            .map(|t| format!("{}({}): {}", t.name(), t.params().join(", "), t.description()))
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// Run a tool by name.
    pub async fn dispatch(&self, name: &str, args: Map<String, Value>) -> Result<ToolOutput, ToolError> {
        let Some(tool) = self.get(name) else {
            return Err(ToolError::UnknownTool {
                name: name.to_string(),
                available: self.names(),
            });
        };
        tracing::info!(tool = name, "Executing tool");
        tool.execute(args).await
    }
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Deserialize keyword arguments into a tool's argument struct.
pub(crate) fn parse_args<T: DeserializeOwned>(tool: &str, args: Map<String, Value>) -> Result<T, ToolError> {
    serde_json::from_value(Value::Object(args)).map_err(|source| ToolError::InvalidArguments {
        tool: tool.to_string(),
        source,
    })
}

/// Run workbook I/O off the async executor.
pub(crate) async fn blocking<F, T>(f: F) -> Result<T, ToolError>
where
    F: FnOnce() -> Result<T, SheetError> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| ToolError::Execution(format!("worker failed: {}", e)))?
        .map_err(ToolError::from)
}

pub(crate) fn path(file_path: &str) -> PathBuf {
    PathBuf::from(file_path)
}
