use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::errors::AgentError;
use crate::rag::embeddings::cosine_similarity;
use crate::rag::RagDocument;

pub const INDEX_FILE_NAME: &str = "index.json";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexNode {
    pub document: RagDocument,
    pub embedding: Vec<f32>,
}

#[derive(Debug, Clone, Copy)]
pub struct SearchResult {
    pub node_id: usize,
    pub score: f32,
}

/// Document chunks with their embeddings, persisted as a single JSON file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct VectorIndex {
    nodes: Vec<IndexNode>,
    embedding_dimension: Option<usize>,
}

impl VectorIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_node(&mut self, document: RagDocument, embedding: Vec<f32>) -> Result<(), AgentError> {
        match self.embedding_dimension {
            Some(expected) if expected != embedding.len() => {
                return Err(AgentError::RagError(format!(
                    "Embedding dimension mismatch: expected {}, got {}",
                    expected,
                    embedding.len()
                )));
            }
            Some(_) => {}
            None => self.embedding_dimension = Some(embedding.len()),
        }

        self.nodes.push(IndexNode {
            document,
            embedding,
        });
        Ok(())
    }

    pub fn node(&self, node_id: usize) -> Option<&IndexNode> {
        self.nodes.get(node_id)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn embedding_dimension(&self) -> Option<usize> {
        self.embedding_dimension
    }

    /// Highest-scoring nodes first, at most `top_k` of them.
    pub fn search(&self, query_embedding: &[f32], top_k: usize) -> Result<Vec<SearchResult>, AgentError> {
        if self.nodes.is_empty() || top_k == 0 {
            return Ok(Vec::new());
        }

        if let Some(expected) = self.embedding_dimension {
            if query_embedding.len() != expected {
                return Err(AgentError::RagError(format!(
                    "Query embedding dimension mismatch: expected {}, got {}",
                    expected,
                    query_embedding.len()
                )));
            }
        }

        let mut results: Vec<SearchResult> = self
            .nodes
            .iter()
            .enumerate()
            .map(|(node_id, node)| SearchResult {
                node_id,
                score: cosine_similarity(query_embedding, &node.embedding),
            })
            .collect();

        results.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        results.truncate(top_k);
        Ok(results)
    }

    pub async fn save(&self, dir: &Path) -> Result<(), AgentError> {
        tokio::fs::create_dir_all(dir).await.map_err(|e| {
            AgentError::RagError(format!(
                "Failed to create storage directory {}: {}",
                dir.display(),
                e
            ))
        })?;

        let data = serde_json::to_string(self)
            .map_err(|e| AgentError::RagError(format!("Failed to serialize index: {}", e)))?;

        let path = dir.join(INDEX_FILE_NAME);
        tokio::fs::write(&path, data).await.map_err(|e| {
            AgentError::RagError(format!("Failed to write index to {}: {}", path.display(), e))
        })?;
        log::info!("Persisted {} index nodes to {}", self.nodes.len(), path.display());
        Ok(())
    }

    pub async fn load(dir: &Path) -> Result<Self, AgentError> {
        let path = dir.join(INDEX_FILE_NAME);
        let data = tokio::fs::read_to_string(&path).await.map_err(|e| {
            AgentError::RagError(format!("Failed to read index {}: {}", path.display(), e))
        })?;

        serde_json::from_str(&data).map_err(|e| {
            AgentError::RagError(format!("Failed to deserialize index {}: {}", path.display(), e))
        })
    }
}
