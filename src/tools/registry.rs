//! Tool registration and dispatch.

use super::{QueryContext, Source, Tool, ToolDefinition};
use crate::error::{KursError, Result};
use async_trait::async_trait;
use std::sync::Arc;
use tracing::{info, warn};

/// Executes tool calls on behalf of the reasoning loop.
#[async_trait]
pub trait ToolExecutor: Send + Sync {
    /// Definitions to offer the model, in a stable order.
    fn definitions(&self) -> Vec<ToolDefinition>;

    /// Run the named tool.
    async fn execute(
        &self,
        name: &str,
        args: &serde_json::Value,
        ctx: &mut QueryContext,
    ) -> Result<String>;
}

/// Name-indexed set of tools, kept in registration order.
#[derive(Default)]
pub struct ToolRegistry {
    tools: Vec<(String, Arc<dyn Tool>)>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a tool under the name in its definition.
    ///
    /// Re-registering a name replaces the earlier tool in place.
    pub fn register(&mut self, tool: Arc<dyn Tool>) -> Result<()> {
        let name = tool.definition().name;
        if name.trim().is_empty() {
            return Err(KursError::Config(
                "Tool must have a 'name' in its definition".to_string(),
            ));
        }

        match self.tools.iter_mut().find(|(n, _)| *n == name) {
            Some(slot) => slot.1 = tool,
            None => self.tools.push((name, tool)),
        }
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&Arc<dyn Tool>> {
        self.tools.iter().find(|(n, _)| n == name).map(|(_, t)| t)
    }

    pub fn names(&self) -> Vec<&str> {
        self.tools.iter().map(|(n, _)| n.as_str()).collect()
    }

    /// Definitions of every registered tool, in registration order.
    pub fn get_tool_definitions(&self) -> Vec<ToolDefinition> {
        self.tools.iter().map(|(_, t)| t.definition()).collect()
    }

    /// Dispatch a call by name.
    ///
    /// An unknown name is not an error: the message goes back to the model
    /// as the tool's output.
    pub async fn execute(
        &self,
        name: &str,
        args: &serde_json::Value,
        ctx: &mut QueryContext,
    ) -> Result<String> {
        match self.get(name) {
            Some(tool) => {
                info!("Executing tool {} with args {}", name, args);
                tool.execute(args, ctx).await
            }
            None => {
                warn!("Model requested unknown tool {}", name);
                Ok(format!("Tool '{}' not found", name))
            }
        }
    }

    /// Sources recorded by every tool, concatenated in registration order.
    pub fn get_last_sources(&self, ctx: &QueryContext) -> Vec<Source> {
        self.tools
            .iter()
            .flat_map(|(name, _)| ctx.sources_for(name).iter().cloned())
            .collect()
    }

    pub fn reset_sources(&self, ctx: &mut QueryContext) {
        ctx.reset_sources();
    }

    /// Read the query's sources and clear them.
    pub fn take_sources(&self, ctx: &mut QueryContext) -> Vec<Source> {
        let sources = self.get_last_sources(ctx);
        self.reset_sources(ctx);
        sources
    }
}

#[async_trait]
impl ToolExecutor for ToolRegistry {
    fn definitions(&self) -> Vec<ToolDefinition> {
        self.get_tool_definitions()
    }

    async fn execute(
        &self,
        name: &str,
        args: &serde_json::Value,
        ctx: &mut QueryContext,
    ) -> Result<String> {
        ToolRegistry::execute(self, name, args, ctx).await
    }
}
