//! General-purpose conversational agent.
//!
//! Runs the native tool-calling loop: the model either answers or requests
//! tool calls, whose results are fed back as tool messages until it answers
//! or `max_steps` model calls have been spent.

use std::sync::Arc;

use crate::core_types::{Message, ToolCall};
use crate::errors::AgentError;
use crate::llm::LLM;
use crate::memory::{ConversationMemory, SlidingWindowMemory};
use crate::tools::{Tool, ToolRegistry};

pub const DEFAULT_MAX_STEPS: usize = 10;

#[derive(Debug, Clone)]
pub struct AgentConfig {
    pub max_steps: usize,
    pub system_prompt: Option<String>,
    pub verbose: bool,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            max_steps: DEFAULT_MAX_STEPS,
            system_prompt: None,
            verbose: false,
        }
    }
}

pub struct Agent {
    llm: Arc<dyn LLM>,
    tools: ToolRegistry,
    memory: Box<dyn ConversationMemory>,
    config: AgentConfig,
}

impl Agent {
    pub fn new(llm: Arc<dyn LLM>, tools: Vec<Arc<dyn Tool>>, config: AgentConfig) -> Self {
        Self {
            llm,
            tools: ToolRegistry::new(tools),
            memory: Box::new(SlidingWindowMemory::default()),
            config,
        }
    }

    /// An agent over `tools` driven by `llm`. `None` keeps the model's
    /// default behaviour with no system prompt.
    pub fn from_llm(
        llm: Arc<dyn LLM>,
        tools: Vec<Arc<dyn Tool>>,
        system_prompt: Option<String>,
        verbose: bool,
    ) -> Self {
        Self::new(
            llm,
            tools,
            AgentConfig {
                system_prompt: system_prompt.filter(|p| !p.trim().is_empty()),
                verbose,
                ..AgentConfig::default()
            },
        )
    }

    pub fn with_memory(mut self, memory: Box<dyn ConversationMemory>) -> Self {
        self.memory = memory;
        self
    }

    fn trace(&self, message: &str) {
        if self.config.verbose {
            log::info!("{}", message);
        } else {
            log::debug!("{}", message);
        }
    }

    /// Answers one user message, using tools as the model requests them.
    ///
    /// Only the user message and the final answer are committed to memory.
    pub async fn chat(&mut self, message: &str) -> Result<String, AgentError> {
        self.trace(&format!("Agent chat started: {}", message));

        let mut messages = Vec::new();
        if let Some(prompt) = &self.config.system_prompt {
            messages.push(Message::system(prompt.clone()));
        }
        messages.extend(self.memory.get_context());
        messages.push(Message::user(message));

        let tool_metadata = if self.tools.is_empty() {
            None
        } else {
            Some(self.tools.list_tools())
        };

        for step in 0..self.config.max_steps {
            self.trace(&format!("Agent step #{}", step + 1));

            let response = self
                .llm
                .generate(messages.clone(), tool_metadata.clone())
                .await
                .map_err(|e| {
                    log::error!("LLM generation failed: {}", e);
                    e
                })?;

            let tool_calls: Vec<ToolCall> = response
                .tool_calls
                .unwrap_or_default()
                .into_iter()
                .map(|mut call| {
                    if call.id.is_none() {
                        call.id = Some(format!("call_{}", uuid::Uuid::new_v4().simple()));
                    }
                    call
                })
                .collect();

            if tool_calls.is_empty() {
                let answer = response
                    .content
                    .map(|c| c.trim().to_string())
                    .filter(|c| !c.is_empty())
                    .ok_or_else(|| {
                        AgentError::LLMError(
                            "LLM did not provide content or tool calls".to_string(),
                        )
                    })?;

                self.trace(&format!("Answer: {}", answer));
                self.memory.add_message(Message::user(message)).await?;
                self.memory.add_message(Message::assistant(answer.clone())).await?;
                return Ok(answer);
            }

            if let Some(thought) = response.content.as_deref().filter(|c| !c.trim().is_empty()) {
                self.trace(&format!("Thought: {}", thought));
            }

            messages.push(Message {
                tool_calls: Some(tool_calls.clone()),
                ..Message::assistant(response.content.unwrap_or_default())
            });

            for call in tool_calls {
                self.trace(&format!(
                    "Action: calling tool '{}' with args {}",
                    call.name, call.arguments
                ));
                let observation = self.execute_tool(&call).await;
                self.trace(&format!("Observation: {}", observation));
                messages.push(Message::tool_result(call.id, observation));
            }
        }

        log::warn!(
            "Agent reached max_steps ({}) without a final answer",
            self.config.max_steps
        );
        Err(AgentError::MaxStepsReached)
    }

    /// Tool failures become observations so the model can recover.
    async fn execute_tool(&self, call: &ToolCall) -> String {
        let Some(tool) = self.tools.get_tool(&call.name) else {
            return format!("Unknown tool: {}", call.name);
        };

        match tool.execute(call.arguments.clone()).await {
            Ok(content) => content,
            Err(e) => {
                log::warn!("Tool '{}' failed: {}", call.name, e);
                format!("Tool '{}' execution failed: {}", call.name, e)
            }
        }
    }

    pub fn reset(&mut self) {
        self.memory.clear();
    }

    pub fn memory_len(&self) -> usize {
        self.memory.len()
    }

    pub fn chat_history(&self) -> Vec<Message> {
        self.memory.get_context()
    }

    pub fn system_prompt(&self) -> Option<&str> {
        self.config.system_prompt.as_deref()
    }

    pub fn tools(&self) -> &[Arc<dyn Tool>] {
        self.tools.tools()
    }

    pub fn is_verbose(&self) -> bool {
        self.config.verbose
    }

    pub fn config(&self) -> &AgentConfig {
        &self.config
    }
}
