//! In-process doubles for the model, tools, and index provider.

use async_trait::async_trait;
use serde_json::Value;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use crate::core_types::{LLMResponse, Message};
use crate::errors::AgentError;
use crate::llm::{ToolMetadata, LLM};
use crate::rag::{IndexProvider, VectorIndex};
use crate::tools::Tool;

/// Replays canned responses in order and records every request.
pub struct ScriptedLLM {
    responses: Mutex<VecDeque<Result<LLMResponse, AgentError>>>,
    requests: Mutex<Vec<Vec<Message>>>,
    tools: Mutex<Vec<Option<Vec<ToolMetadata>>>>,
}

impl ScriptedLLM {
    pub fn new(responses: Vec<LLMResponse>) -> Self {
        Self::with_results(responses.into_iter().map(Ok).collect())
    }

    pub fn with_results(responses: Vec<Result<LLMResponse, AgentError>>) -> Self {
        Self {
            responses: Mutex::new(VecDeque::from(responses)),
            requests: Mutex::new(Vec::new()),
            tools: Mutex::new(Vec::new()),
        }
    }

    pub fn from_texts(texts: &[&str]) -> Self {
        Self::new(texts.iter().map(|t| LLMResponse::text(*t)).collect())
    }

    pub fn recorded_requests(&self) -> Vec<Vec<Message>> {
        self.requests.lock().unwrap().clone()
    }

    pub fn recorded_tools(&self) -> Vec<Option<Vec<ToolMetadata>>> {
        self.tools.lock().unwrap().clone()
    }
}

#[async_trait]
impl LLM for ScriptedLLM {
    async fn generate(
        &self,
        messages: Vec<Message>,
        tools: Option<Vec<ToolMetadata>>,
    ) -> Result<LLMResponse, AgentError> {
        self.requests.lock().unwrap().push(messages);
        self.tools.lock().unwrap().push(tools);
        self.responses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(AgentError::LLMError("No scripted responses left".to_string())))
    }
}

/// Returns `echo: <input>`; fails when `input` is missing.
pub struct EchoTool;

#[async_trait]
impl Tool for EchoTool {
    fn metadata(&self) -> ToolMetadata {
        ToolMetadata {
            name: "echo".to_string(),
            description: "Echoes its input".to_string(),
            input_schema: serde_json::json!({
                "type": "object",
                "properties": {"input": {"type": "string"}},
                "required": ["input"]
            }),
        }
    }

    async fn execute(&self, arguments: Value) -> Result<String, AgentError> {
        arguments
            .get("input")
            .and_then(Value::as_str)
            .map(|input| format!("echo: {}", input))
            .ok_or_else(|| AgentError::tool("echo", "Missing 'input'"))
    }
}

pub struct StaticIndexProvider {
    index: Option<Arc<VectorIndex>>,
}

impl StaticIndexProvider {
    pub fn absent() -> Self {
        Self { index: None }
    }

    pub fn present(index: VectorIndex) -> Self {
        Self {
            index: Some(Arc::new(index)),
        }
    }
}

#[async_trait]
impl IndexProvider for StaticIndexProvider {
    async fn get_index(&self) -> Result<Option<Arc<VectorIndex>>, AgentError> {
        Ok(self.index.clone())
    }
}
