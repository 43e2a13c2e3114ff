//! Retrieval tools offered to the language model.
//!
//! Two tools sit on top of the [`SearchEngine`](crate::search::SearchEngine):
//! content search with provenance, and course outlines straight from the
//! catalog. The [`ToolRegistry`] dispatches calls by name and collects the
//! per-query [`Source`] records the tools leave in a [`QueryContext`].

mod outline;
mod registry;
mod search;

pub use outline::CourseOutlineTool;
pub use registry::{ToolExecutor, ToolRegistry};
pub use search::CourseSearchTool;

use crate::error::{KursError, Result};
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Provenance for one retrieved snippet.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Source {
    /// Display label, e.g. "Advanced Python - Lesson 2".
    #[serde(rename = "text")]
    pub label: String,
    /// Deep link to the lesson or course, when known.
    #[serde(rename = "url")]
    pub link: Option<String>,
}

impl Source {
    pub fn new(label: impl Into<String>, link: Option<String>) -> Self {
        Self {
            label: label.into(),
            link,
        }
    }
}

/// Per-query state threaded through tool execution.
///
/// Each tool owns one source slot, keyed by tool name. A fresh context
/// carries no provenance, so nothing leaks between queries.
#[derive(Debug, Default)]
pub struct QueryContext {
    sources: HashMap<String, Vec<Source>>,
}

impl QueryContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the sources recorded for `tool`.
    pub fn set_sources(&mut self, tool: &str, sources: Vec<Source>) {
        self.sources.insert(tool.to_string(), sources);
    }

    /// Sources recorded for `tool`, empty if it recorded none.
    pub fn sources_for(&self, tool: &str) -> &[Source] {
        self.sources.get(tool).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Drop all recorded sources.
    pub fn reset_sources(&mut self) {
        self.sources.clear();
    }
}

/// Machine-readable description of a tool.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolDefinition {
    pub name: String,
    pub description: String,
    /// JSON schema of the tool's arguments.
    pub input_schema: serde_json::Value,
}

/// A tool the language model can call.
#[async_trait]
pub trait Tool: Send + Sync {
    /// Name, description and argument schema.
    fn definition(&self) -> ToolDefinition;

    /// Run the tool with JSON arguments.
    ///
    /// Expected failures (no match, index errors) come back as `Ok` text for
    /// the model to read. `Err` is reserved for calls the tool cannot run at
    /// all, such as malformed arguments.
    async fn execute(&self, args: &serde_json::Value, ctx: &mut QueryContext) -> Result<String>;
}

/// Deserialize tool arguments, naming the tool on failure.
pub(crate) fn parse_args<T: DeserializeOwned>(tool: &str, args: &serde_json::Value) -> Result<T> {
    serde_json::from_value(args.clone())
        .map_err(|e| KursError::Tool(format!("Invalid arguments for {}: {}", tool, e)))
}
