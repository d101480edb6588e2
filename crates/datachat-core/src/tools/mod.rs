//! Callable tools exposed to agents.

use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;

use crate::errors::AgentError;
use crate::llm::ToolMetadata;

pub mod calculator;
pub mod factory;
pub mod query_engine_tool;
pub mod web_search;

pub use calculator::CalculatorTool;
pub use factory::ToolFactory;
pub use query_engine_tool::QueryEngineTool;
pub use web_search::WebSearchTool;

#[async_trait]
pub trait Tool: Send + Sync {
    fn metadata(&self) -> ToolMetadata;
    async fn execute(&self, arguments: Value) -> Result<String, AgentError>;
}

/// Ordered tool set an agent dispatches into. Lookup is by name; the first
/// tool registered under a name wins.
#[derive(Clone, Default)]
pub struct ToolRegistry {
    tools: Vec<Arc<dyn Tool>>,
}

impl ToolRegistry {
    pub fn new(tools: Vec<Arc<dyn Tool>>) -> Self {
        let mut registry = Self::default();
        for tool in tools {
            registry.register_tool(tool);
        }
        registry
    }

    pub fn register_tool(&mut self, tool: Arc<dyn Tool>) {
        let name = tool.metadata().name;
        if self.get_tool(&name).is_some() {
            log::warn!("Duplicate tool '{}' ignored", name);
            return;
        }
        self.tools.push(tool);
    }

    pub fn get_tool(&self, name: &str) -> Option<Arc<dyn Tool>> {
        self.tools
            .iter()
            .find(|tool| tool.metadata().name == name)
            .cloned()
    }

    pub fn list_tools(&self) -> Vec<ToolMetadata> {
        self.tools.iter().map(|tool| tool.metadata()).collect()
    }

    pub fn tools(&self) -> &[Arc<dyn Tool>] {
        &self.tools
    }

    pub fn tool_count(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }
}
