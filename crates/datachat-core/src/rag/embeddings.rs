use crate::config::{EmbeddingConfig, EmbeddingProvider};
use crate::errors::AgentError;
use async_trait::async_trait;
use reqwest::Client;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;

#[async_trait]
pub trait EmbeddingGenerator: Send + Sync {
    async fn generate_embedding(&self, text: &str) -> Result<Vec<f32>, AgentError>;

    async fn generate_embeddings(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, AgentError> {
        let mut embeddings = Vec::with_capacity(texts.len());
        for text in texts {
            embeddings.push(self.generate_embedding(text).await?);
        }
        Ok(embeddings)
    }

    fn embedding_dimension(&self) -> usize;
}

/// Builds the embedding generator selected by configuration.
pub fn create_embedding_generator(
    config: &EmbeddingConfig,
) -> Result<Arc<dyn EmbeddingGenerator>, AgentError> {
    match config.provider {
        EmbeddingProvider::Simple => Ok(Arc::new(DummyEmbeddingGenerator::with_dimension(
            config.dimension,
        ))),
        EmbeddingProvider::OpenAI => Ok(Arc::new(RestEmbeddingClient::new(RestEmbeddingConfig {
            api_base_url: config.base_url.clone(),
            api_key: config.api_key.clone(),
            model_name: config.model.clone(),
            embedding_dimension: config.dimension,
            ..RestEmbeddingConfig::default()
        })?)),
    }
}

/// Hash-based embeddings: deterministic, offline, and only useful for
/// exact-text matching.
pub struct DummyEmbeddingGenerator {
    embedding_dimension: usize,
}

impl DummyEmbeddingGenerator {
    pub fn new() -> Self {
        Self::with_dimension(384)
    }

    pub fn with_dimension(dimension: usize) -> Self {
        Self {
            embedding_dimension: dimension.max(1),
        }
    }
}

impl Default for DummyEmbeddingGenerator {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl EmbeddingGenerator for DummyEmbeddingGenerator {
    async fn generate_embedding(&self, text: &str) -> Result<Vec<f32>, AgentError> {
        use std::collections::hash_map::DefaultHasher;
        use std::hash::{Hash, Hasher};

        let mut hasher = DefaultHasher::new();
        text.hash(&mut hasher);
        let hash = hasher.finish();

        let mut embedding: Vec<f32> = (0..self.embedding_dimension)
            .map(|i| {
                let seed = hash.wrapping_mul(31).wrapping_add(i as u64 * 2654435761);
                ((seed % 1000) as f32 - 500.0) / 500.0
            })
            .collect();

        let magnitude: f32 = embedding.iter().map(|x| x * x).sum::<f32>().sqrt();
        if magnitude > 0.0 {
            for val in &mut embedding {
                *val /= magnitude;
            }
        }

        Ok(embedding)
    }

    fn embedding_dimension(&self) -> usize {
        self.embedding_dimension
    }
}

pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() {
        return 0.0;
    }

    let dot_product: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let magnitude_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let magnitude_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();

    if magnitude_a == 0.0 || magnitude_b == 0.0 {
        return 0.0;
    }

    dot_product / (magnitude_a * magnitude_b)
}

#[derive(Debug, Clone)]
pub struct RestEmbeddingConfig {
    pub api_base_url: String,
    pub api_key: Option<String>,
    pub model_name: String,
    pub embedding_dimension: usize,
    pub timeout_seconds: u64,
    pub max_batch_size: usize,
}

impl Default for RestEmbeddingConfig {
    fn default() -> Self {
        Self {
            api_base_url: "https://api.openai.com/v1".to_string(),
            api_key: None,
            model_name: "text-embedding-3-small".to_string(),
            embedding_dimension: 1536,
            timeout_seconds: 30,
            max_batch_size: 100,
        }
    }
}

/// Client for OpenAI-compatible `/embeddings` endpoints.
pub struct RestEmbeddingClient {
    client: Client,
    config: RestEmbeddingConfig,
}

impl RestEmbeddingClient {
    pub fn new(config: RestEmbeddingConfig) -> Result<Self, AgentError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()
            .map_err(|e| AgentError::RagError(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self { client, config })
    }

    pub fn config(&self) -> &RestEmbeddingConfig {
        &self.config
    }

    pub fn create_batches<'a>(&self, texts: &'a [String]) -> Vec<&'a [String]> {
        texts.chunks(self.config.max_batch_size.max(1)).collect()
    }

    async fn call_api(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, AgentError> {
        let url = format!(
            "{}/embeddings",
            self.config.api_base_url.trim_end_matches('/')
        );

        let payload = json!({
            "model": self.config.model_name,
            "input": texts,
            "encoding_format": "float"
        });

        let mut request = self
            .client
            .post(&url)
            .header("Content-Type", "application/json");
        if let Some(api_key) = &self.config.api_key {
            request = request.header("Authorization", format!("Bearer {}", api_key));
        }

        let response = request
            .json(&payload)
            .send()
            .await
            .map_err(|e| AgentError::RagError(format!("Embedding request failed: {}", e)))?;

        let status = response.status();
        let response_text = response
            .text()
            .await
            .map_err(|e| AgentError::RagError(format!("Failed to read response: {}", e)))?;

        if !status.is_success() {
            log::error!("Embedding API error response: {}", response_text);
            return Err(AgentError::RagError(format!(
                "Embedding API error ({}): {}",
                status, response_text
            )));
        }

        let mut response_data: EmbeddingResponse =
            serde_json::from_str(&response_text).map_err(|e| {
                AgentError::RagError(format!("Failed to parse embedding response: {}", e))
            })?;

        if response_data.data.len() != texts.len() {
            return Err(AgentError::RagError(format!(
                "Mismatch between input texts ({}) and returned embeddings ({})",
                texts.len(),
                response_data.data.len()
            )));
        }

        response_data.data.sort_by_key(|item| item.index);
        Ok(response_data
            .data
            .into_iter()
            .map(|item| item.embedding)
            .collect())
    }
}

#[async_trait]
impl EmbeddingGenerator for RestEmbeddingClient {
    async fn generate_embedding(&self, text: &str) -> Result<Vec<f32>, AgentError> {
        let embeddings = self.generate_embeddings(&[text.to_string()]).await?;
        embeddings
            .into_iter()
            .next()
            .ok_or_else(|| AgentError::RagError("No embedding returned from API".to_string()))
    }

    async fn generate_embeddings(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, AgentError> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        if texts.iter().any(|text| text.trim().is_empty()) {
            return Err(AgentError::RagError(
                "Cannot embed empty text".to_string(),
            ));
        }

        let batches = self.create_batches(texts);
        let mut all_embeddings = Vec::with_capacity(texts.len());

        for (i, batch) in batches.iter().enumerate() {
            log::debug!(
                "Embedding batch {}/{} ({} texts) with {}",
                i + 1,
                batches.len(),
                batch.len(),
                self.config.model_name
            );
            all_embeddings.extend(self.call_api(batch).await?);
        }

        Ok(all_embeddings)
    }

    fn embedding_dimension(&self) -> usize {
        self.config.embedding_dimension
    }
}

#[derive(Debug, serde::Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingItem>,
}

#[derive(Debug, serde::Deserialize)]
struct EmbeddingItem {
    embedding: Vec<f32>,
    #[serde(default)]
    index: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cosine_similarity() {
        let a = vec![1.0, 0.0, 0.0];
        let b = vec![1.0, 0.0, 0.0];
        let c = vec![0.0, 1.0, 0.0];

        assert!((cosine_similarity(&a, &b) - 1.0).abs() < 0.001);
        assert!((cosine_similarity(&a, &c) - 0.0).abs() < 0.001);
        assert_eq!(cosine_similarity(&a, &[1.0]), 0.0);
    }

    #[tokio::test]
    async fn test_dummy_embedding_generator_is_deterministic() {
        let generator = DummyEmbeddingGenerator::with_dimension(32);

        let embedding = generator.generate_embedding("grades by school").await.unwrap();
        assert_eq!(embedding.len(), 32);

        let again = generator.generate_embedding("grades by school").await.unwrap();
        assert_eq!(embedding, again);

        let other = generator.generate_embedding("something else").await.unwrap();
        assert_ne!(embedding, other);
    }

    #[test]
    fn test_batches() {
        let client = RestEmbeddingClient::new(RestEmbeddingConfig {
            max_batch_size: 2,
            ..Default::default()
        })
        .unwrap();

        let texts: Vec<String> = (1..=5).map(|i| format!("text{}", i)).collect();
        let batches = client.create_batches(&texts);
        assert_eq!(batches.len(), 3);
        assert_eq!(batches[2].len(), 1);
    }

    #[test]
    fn test_factory_selects_provider() {
        let simple = EmbeddingConfig {
            provider: EmbeddingProvider::Simple,
            dimension: 8,
            ..EmbeddingConfig::default()
        };
        assert_eq!(create_embedding_generator(&simple).unwrap().embedding_dimension(), 8);

        let openai = EmbeddingConfig::default();
        assert_eq!(
            create_embedding_generator(&openai).unwrap().embedding_dimension(),
            1536
        );
    }
}
