//! Model handles shared by every assembler.

use std::sync::Arc;

use crate::config::EngineConfig;
use crate::errors::AgentError;
use crate::llm::{create_llm_client, LLM};
use crate::rag::{create_embedding_generator, EmbeddingGenerator};

/// The chat model and embedding model an engine is built with.
///
/// Cheap to clone; both handles are reference counted.
#[derive(Clone)]
pub struct Settings {
    pub llm: Arc<dyn LLM>,
    pub embed_model: Arc<dyn EmbeddingGenerator>,
}

impl Settings {
    pub fn new(llm: Arc<dyn LLM>, embed_model: Arc<dyn EmbeddingGenerator>) -> Self {
        Self { llm, embed_model }
    }

    pub fn from_config(config: &EngineConfig) -> Result<Self, AgentError> {
        let llm = create_llm_client(&config.llm)?;
        let embed_model = create_embedding_generator(&config.embedding)?;
        Ok(Self { llm, embed_model })
    }
}

impl std::fmt::Debug for Settings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Settings")
            .field("embedding_dimension", &self.embed_model.embedding_dimension())
            .finish_non_exhaustive()
    }
}
