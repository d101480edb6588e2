//! Language model abstraction.
//!
//! Agents talk to models only through the [`LLM`] trait. Concrete clients live
//! in [`providers`]; the process-wide "default model" of other frameworks is
//! replaced by an explicit [`crate::settings::Settings`] value.

pub use crate::core_types::{LLMResponse, Message};
use crate::errors::AgentError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

pub mod providers;

pub use providers::{create_llm_client, OpenAIClient};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ToolMetadata {
    pub name: String,
    pub description: String,
    pub input_schema: Value,
}

#[async_trait]
pub trait LLM: Send + Sync {
    async fn generate(
        &self,
        messages: Vec<Message>,
        tools: Option<Vec<ToolMetadata>>,
    ) -> Result<LLMResponse, AgentError>;
}
