//! Error types shared by every assembly step and collaborator.
//!
//! Failures are grouped by the subsystem that produced them (model, tools,
//! configuration, retrieval, sandbox) so a caller can decide how to present
//! them without string matching.

use thiserror::Error;

#[derive(Error, Debug, Clone)]
pub enum AgentError {
    #[error("LLM interaction failed: {0}")]
    LLMError(String),
    #[error("Tool execution failed for '{tool_name}': {message}")]
    ToolError { tool_name: String, message: String },
    #[error("Configuration error: {0}")]
    ConfigError(String),
    #[error("Parsing error: {0}")]
    ParsingError(String),
    #[error("Maximum steps reached")]
    MaxStepsReached,
    #[error("RAG operation failed: {0}")]
    RagError(String),
    #[error("Sandbox request failed: {0}")]
    SandboxError(String),
    #[error("Dataset upload failed: {0}")]
    UploadFailed(String),
    #[error("I/O error: {0}")]
    IoError(String),
}

impl From<std::io::Error> for AgentError {
    fn from(err: std::io::Error) -> Self {
        AgentError::IoError(err.to_string())
    }
}

impl From<reqwest::Error> for AgentError {
    fn from(err: reqwest::Error) -> Self {
        AgentError::LLMError(err.to_string())
    }
}

impl AgentError {
    pub(crate) fn tool(tool_name: &str, message: impl Into<String>) -> Self {
        AgentError::ToolError {
            tool_name: tool_name.to_string(),
            message: message.into(),
        }
    }
}
