//! Document retrieval: persisted vector index, index provider, and the
//! similarity-bounded query engine exposed to agents as a tool.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;

use crate::errors::AgentError;
use crate::settings::Settings;

pub mod builder;
pub mod embeddings;
pub mod provider;
pub mod query_engine;
pub mod splitter;
pub mod vector_store;

pub use builder::IndexBuilder;
pub use embeddings::*;
pub use provider::StorageIndexProvider;
pub use query_engine::{QueryEngine, QueryResponse};
pub use splitter::TextSplitter;
pub use vector_store::{SearchResult, VectorIndex};

/// Reports whether a retrieval index is available.
///
/// An absent index is `Ok(None)`, never an error.
#[async_trait]
pub trait IndexProvider: Send + Sync {
    async fn get_index(&self) -> Result<Option<Arc<VectorIndex>>, AgentError>;
}

pub trait AsQueryEngine {
    fn as_query_engine(&self, settings: &Settings, similarity_top_k: usize) -> QueryEngine;
}

impl AsQueryEngine for Arc<VectorIndex> {
    fn as_query_engine(&self, settings: &Settings, similarity_top_k: usize) -> QueryEngine {
        QueryEngine::new(self.clone(), settings, similarity_top_k)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RagDocument {
    pub content: String,
    pub metadata: HashMap<String, String>,
    pub source: String,
    pub chunk_index: Option<usize>,
}

impl RagDocument {
    pub fn new(content: String, source: String) -> Self {
        Self {
            content,
            metadata: HashMap::new(),
            source,
            chunk_index: None,
        }
    }

    pub fn with_metadata(mut self, metadata: HashMap<String, String>) -> Self {
        self.metadata = metadata;
        self
    }

    pub fn with_chunk_index(mut self, chunk_index: usize) -> Self {
        self.chunk_index = Some(chunk_index);
        self
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RetrievedContext {
    pub documents: Vec<RagDocument>,
    pub scores: Vec<f32>,
}

impl RetrievedContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_document(&mut self, document: RagDocument, score: f32) {
        self.documents.push(document);
        self.scores.push(score);
    }

    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }

    pub fn len(&self) -> usize {
        self.documents.len()
    }

    /// Context block handed to the model, one entry per retrieved chunk.
    pub fn format_for_llm(&self) -> String {
        self.documents
            .iter()
            .map(|doc| format!("source: {}\n\n{}", doc.source, doc.content))
            .collect::<Vec<_>>()
            .join("\n\n")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retrieved_context_format() {
        let mut context = RetrievedContext::new();
        context.add_document(
            RagDocument::new("First document content".to_string(), "doc1.txt".to_string()),
            0.9,
        );
        context.add_document(
            RagDocument::new("Second document content".to_string(), "doc2.txt".to_string()),
            0.8,
        );

        let formatted = context.format_for_llm();
        assert_eq!(context.len(), 2);
        assert!(formatted.contains("source: doc1.txt\n\nFirst document content"));
        assert!(formatted.contains("source: doc2.txt\n\nSecond document content"));
    }

    #[test]
    fn test_rag_document_builder() {
        let doc = RagDocument::new("Test content".to_string(), "test.txt".to_string())
            .with_chunk_index(5);

        assert_eq!(doc.source, "test.txt");
        assert_eq!(doc.chunk_index, Some(5));
    }
}
