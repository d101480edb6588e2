//! Agent assembly for dataset conversations.
//!
//! Two assemblers live in [`engine`]:
//!
//! - [`build_chat_agent`] wires the configured model to an optional
//!   retrieval tool over the persisted document index plus the tools declared
//!   in the tools file.
//! - [`build_interpreter_agent`] uploads a dataset into a remote
//!   code-interpreter session and returns a ReAct agent that analyses it.
//!
//! Configuration is an explicit [`EngineConfig`] value and model handles an
//! explicit [`Settings`] value; nothing is held in process-wide state.

pub mod agent;
pub mod config;
pub mod core_types;
pub mod engine;
pub mod errors;
pub mod llm;
pub mod memory;
pub mod prompts;
pub mod rag;
pub mod react;
pub mod sandbox;
pub mod settings;
pub mod tools;

#[cfg(test)]
pub mod test_utils;

pub use agent::{Agent, AgentConfig};
pub use config::EngineConfig;
pub use engine::{
    build_chat_agent, build_interpreter_agent, build_retrieval_tool, collect_tools,
    EngineContext, InterpreterSession,
};
pub use errors::AgentError;
pub use llm::LLM;
pub use react::ReActAgent;
pub use sandbox::{CodeInterpreterToolSpec, RemoteFileMetadata};
pub use settings::Settings;
pub use tools::{Tool, ToolFactory};
