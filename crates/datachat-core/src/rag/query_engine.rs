use std::sync::Arc;

use crate::core_types::Message;
use crate::errors::AgentError;
use crate::llm::LLM;
use crate::prompts::format_text_qa_prompt;
use crate::rag::{EmbeddingGenerator, RetrievedContext, VectorIndex};
use crate::settings::Settings;

pub const EMPTY_RESPONSE: &str = "Empty Response";

#[derive(Debug, Clone)]
pub struct QueryResponse {
    pub response: String,
    pub source_nodes: RetrievedContext,
}

/// Retrieve-then-synthesize over a [`VectorIndex`], bounded to
/// `similarity_top_k` chunks per query.
#[derive(Clone)]
pub struct QueryEngine {
    index: Arc<VectorIndex>,
    embed_model: Arc<dyn EmbeddingGenerator>,
    llm: Arc<dyn LLM>,
    similarity_top_k: usize,
}

impl QueryEngine {
    pub fn new(index: Arc<VectorIndex>, settings: &Settings, similarity_top_k: usize) -> Self {
        Self {
            index,
            embed_model: settings.embed_model.clone(),
            llm: settings.llm.clone(),
            similarity_top_k,
        }
    }

    pub fn similarity_top_k(&self) -> usize {
        self.similarity_top_k
    }

    pub async fn retrieve(&self, query: &str) -> Result<RetrievedContext, AgentError> {
        let query_embedding = self.embed_model.generate_embedding(query).await?;
        let results = self.index.search(&query_embedding, self.similarity_top_k)?;

        let mut context = RetrievedContext::new();
        for result in results {
            if let Some(node) = self.index.node(result.node_id) {
                context.add_document(node.document.clone(), result.score);
            }
        }

        log::debug!(
            "Retrieved {} nodes (top_k={}) for query: {}",
            context.len(),
            self.similarity_top_k,
            query
        );
        Ok(context)
    }

    pub async fn query(&self, query: &str) -> Result<QueryResponse, AgentError> {
        let source_nodes = self.retrieve(query).await?;
        if source_nodes.is_empty() {
            return Ok(QueryResponse {
                response: EMPTY_RESPONSE.to_string(),
                source_nodes,
            });
        }

        let prompt = format_text_qa_prompt(&source_nodes.format_for_llm(), query);
        let response = self.llm.generate(vec![Message::user(prompt)], None).await?;

        Ok(QueryResponse {
            response: response
                .content
                .filter(|c| !c.trim().is_empty())
                .unwrap_or_else(|| EMPTY_RESPONSE.to_string()),
            source_nodes,
        })
    }
}
