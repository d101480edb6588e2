use async_trait::async_trait;
use serde_json::{json, Value};

use crate::errors::AgentError;
use crate::llm::ToolMetadata;
use crate::rag::QueryEngine;
use crate::tools::Tool;

pub const DEFAULT_NAME: &str = "query_engine";
pub const DEFAULT_DESCRIPTION: &str = "Useful for running a natural language query against a knowledge base and get back a natural language response.";

/// Exposes a [`QueryEngine`] to agents as a single-argument tool.
pub struct QueryEngineTool {
    query_engine: QueryEngine,
    name: String,
    description: String,
}

impl QueryEngineTool {
    pub fn from_defaults(query_engine: QueryEngine) -> Self {
        Self::new(query_engine, DEFAULT_NAME, DEFAULT_DESCRIPTION)
    }

    pub fn new(
        query_engine: QueryEngine,
        name: impl Into<String>,
        description: impl Into<String>,
    ) -> Self {
        Self {
            query_engine,
            name: name.into(),
            description: description.into(),
        }
    }

    pub fn query_engine(&self) -> &QueryEngine {
        &self.query_engine
    }
}

#[async_trait]
impl Tool for QueryEngineTool {
    fn metadata(&self) -> ToolMetadata {
        ToolMetadata {
            name: self.name.clone(),
            description: self.description.clone(),
            input_schema: json!({
                "type": "object",
                "properties": {
                    "input": {
                        "type": "string",
                        "description": "The natural language query"
                    }
                },
                "required": ["input"]
            }),
        }
    }

    async fn execute(&self, arguments: Value) -> Result<String, AgentError> {
        // Models sometimes pass the query as a bare string.
        let query = match &arguments {
            Value::String(s) => s.as_str(),
            _ => arguments
                .get("input")
                .and_then(Value::as_str)
                .ok_or_else(|| AgentError::tool(&self.name, "Missing or invalid 'input' parameter"))?,
        };

        let response = self.query_engine.query(query).await?;
        log::debug!(
            "{} answered from {} source nodes",
            self.name,
            response.source_nodes.len()
        );
        Ok(response.response)
    }
}
