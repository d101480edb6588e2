//! Reasoning-trace (ReAct) agent.
//!
//! The model drives tools through plain text: it writes `Thought:`,
//! `Action:` and `Action Input:` lines, receives an `Observation:`, and
//! finishes with `Answer:`. The system header that teaches this grammar is
//! fixed when the agent is built.

use std::sync::Arc;

use crate::core_types::Message;
use crate::errors::AgentError;
use crate::llm::LLM;
use crate::memory::{ConversationMemory, SlidingWindowMemory};
use crate::prompts::DEFAULT_REACT_HEADER;
use crate::tools::{Tool, ToolRegistry};

pub mod output_parser;

pub use output_parser::{parse_reasoning, ReasoningStep};

pub const DEFAULT_MAX_ITERATIONS: usize = 10;

const PARSE_RETRY_OBSERVATION: &str =
    "Could not parse output. Please follow the thought-action-input format. Try again.";

/// Fills `{tool_desc}` and `{tool_names}` and turns `{{`/`}}` into braces.
pub fn render_system_header(template: &str, tools: &ToolRegistry) -> String {
    let tool_desc = tools
        .list_tools()
        .iter()
        .map(|tool| {
            format!(
                "> Tool Name: {}\nTool Description: {}\nTool Args: {}\n",
                tool.name, tool.description, tool.input_schema
            )
        })
        .collect::<Vec<_>>()
        .join("\n");
    let tool_names = tools
        .list_tools()
        .into_iter()
        .map(|tool| tool.name)
        .collect::<Vec<_>>()
        .join(", ");

    let mut rendered = String::with_capacity(template.len() + tool_desc.len());
    let mut rest = template;
    while !rest.is_empty() {
        if let Some(after) = rest.strip_prefix("{{") {
            rendered.push('{');
            rest = after;
        } else if let Some(after) = rest.strip_prefix("}}") {
            rendered.push('}');
            rest = after;
        } else if let Some(after) = rest.strip_prefix("{tool_desc}") {
            rendered.push_str(&tool_desc);
            rest = after;
        } else if let Some(after) = rest.strip_prefix("{tool_names}") {
            rendered.push_str(&tool_names);
            rest = after;
        } else {
            let mut chars = rest.chars();
            if let Some(c) = chars.next() {
                rendered.push(c);
            }
            rest = chars.as_str();
        }
    }
    rendered
}

pub struct ReActAgentBuilder {
    llm: Option<Arc<dyn LLM>>,
    tools: Vec<Arc<dyn Tool>>,
    system_header: String,
    max_iterations: usize,
    verbose: bool,
    memory: Option<Box<dyn ConversationMemory>>,
}

impl Default for ReActAgentBuilder {
    fn default() -> Self {
        Self {
            llm: None,
            tools: Vec::new(),
            system_header: DEFAULT_REACT_HEADER.to_string(),
            max_iterations: DEFAULT_MAX_ITERATIONS,
            verbose: false,
            memory: None,
        }
    }
}

impl ReActAgentBuilder {
    pub fn llm(mut self, llm: Arc<dyn LLM>) -> Self {
        self.llm = Some(llm);
        self
    }

    pub fn tools(mut self, tools: Vec<Arc<dyn Tool>>) -> Self {
        self.tools = tools;
        self
    }

    /// Header template with `{tool_desc}` and `{tool_names}` placeholders.
    pub fn system_header(mut self, header: impl Into<String>) -> Self {
        self.system_header = header.into();
        self
    }

    pub fn max_iterations(mut self, max_iterations: usize) -> Self {
        self.max_iterations = max_iterations;
        self
    }

    pub fn verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    pub fn memory(mut self, memory: Box<dyn ConversationMemory>) -> Self {
        self.memory = Some(memory);
        self
    }

    pub fn build(self) -> Result<ReActAgent, AgentError> {
        let llm = self.llm.ok_or_else(|| {
            AgentError::ConfigError("ReAct agent requires a language model".to_string())
        })?;
        if self.max_iterations == 0 {
            return Err(AgentError::ConfigError(
                "ReAct agent max_iterations must be at least 1".to_string(),
            ));
        }

        Ok(ReActAgent {
            llm,
            tools: ToolRegistry::new(self.tools),
            system_header: self.system_header,
            max_iterations: self.max_iterations,
            verbose: self.verbose,
            memory: self
                .memory
                .unwrap_or_else(|| Box::new(SlidingWindowMemory::default())),
        })
    }
}

pub struct ReActAgent {
    llm: Arc<dyn LLM>,
    tools: ToolRegistry,
    system_header: String,
    max_iterations: usize,
    verbose: bool,
    memory: Box<dyn ConversationMemory>,
}

impl ReActAgent {
    pub fn builder() -> ReActAgentBuilder {
        ReActAgentBuilder::default()
    }

    pub fn from_tools(tools: Vec<Arc<dyn Tool>>, llm: Arc<dyn LLM>) -> Result<Self, AgentError> {
        Self::builder().tools(tools).llm(llm).build()
    }

    fn trace(&self, message: &str) {
        if self.verbose {
            log::info!("{}", message);
        } else {
            log::debug!("{}", message);
        }
    }

    /// Runs the reasoning loop for one user message.
    pub async fn chat(&mut self, message: &str) -> Result<String, AgentError> {
        let mut messages = vec![Message::system(self.rendered_system_header())];
        messages.extend(self.memory.get_context());
        messages.push(Message::user(message));

        for iteration in 0..self.max_iterations {
            let response = self.llm.generate(messages.clone(), None).await?;
            let output = response.content.unwrap_or_default();
            self.trace(&format!("ReAct step #{}:\n{}", iteration + 1, output.trim()));

            let step = match parse_reasoning(&output) {
                Ok(step) => step,
                Err(e) => {
                    log::warn!("{}", e);
                    messages.push(Message::assistant(output));
                    messages.push(Message::user(format!(
                        "Observation: {}",
                        PARSE_RETRY_OBSERVATION
                    )));
                    continue;
                }
            };

            match step {
                ReasoningStep::Response { response, .. } => {
                    self.memory.add_message(Message::user(message)).await?;
                    self.memory
                        .add_message(Message::assistant(response.clone()))
                        .await?;
                    return Ok(response);
                }
                ReasoningStep::Action {
                    thought,
                    action,
                    action_input,
                } => {
                    let observation = self.call_tool(&action, action_input.clone()).await;
                    self.trace(&format!("Observation: {}", observation));
                    messages.push(Message::assistant(format!(
                        "Thought: {}\nAction: {}\nAction Input: {}",
                        thought, action, action_input
                    )));
                    messages.push(Message::user(format!("Observation: {}", observation)));
                }
            }
        }

        log::warn!("ReAct agent reached max iterations ({})", self.max_iterations);
        Err(AgentError::MaxStepsReached)
    }

    async fn call_tool(&self, name: &str, input: serde_json::Value) -> String {
        let Some(tool) = self.tools.get_tool(name) else {
            return format!("Error: No such tool named `{}`.", name);
        };
        match tool.execute(input).await {
            Ok(output) => output,
            Err(e) => format!("Error: {}", e),
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

    /// The header template as supplied to the builder.
    pub fn system_header(&self) -> &str {
        &self.system_header
    }

    pub fn rendered_system_header(&self) -> String {
        render_system_header(&self.system_header, &self.tools)
    }

    pub fn tools(&self) -> &[Arc<dyn Tool>] {
        self.tools.tools()
    }

    pub fn max_iterations(&self) -> usize {
        self.max_iterations
    }

    pub fn is_verbose(&self) -> bool {
        self.verbose
    }
}
