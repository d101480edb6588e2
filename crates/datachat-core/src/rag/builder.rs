use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::errors::AgentError;
use crate::rag::{EmbeddingGenerator, RagDocument, TextSplitter, VectorIndex};

const INDEXABLE_EXTENSIONS: &[&str] = &[
    "txt", "md", "markdown", "rst", "csv", "tsv", "json", "yaml", "yml", "toml", "html", "xml",
];

/// Generates a [`VectorIndex`] from the text files under a data directory.
pub struct IndexBuilder {
    embed_model: Arc<dyn EmbeddingGenerator>,
    splitter: TextSplitter,
}

impl IndexBuilder {
    pub fn new(embed_model: Arc<dyn EmbeddingGenerator>) -> Self {
        Self {
            embed_model,
            splitter: TextSplitter::default(),
        }
    }

    pub fn with_splitter(mut self, splitter: TextSplitter) -> Self {
        self.splitter = splitter;
        self
    }

    pub async fn build_from_dir(&self, data_dir: &Path) -> Result<VectorIndex, AgentError> {
        if !data_dir.is_dir() {
            return Err(AgentError::RagError(format!(
                "Data directory {} does not exist",
                data_dir.display()
            )));
        }

        let files = collect_files(data_dir).await?;
        log::info!("Indexing {} files from {}", files.len(), data_dir.display());

        let mut index = VectorIndex::new();
        for path in files {
            let content = match tokio::fs::read_to_string(&path).await {
                Ok(content) => content,
                Err(e) => {
                    log::warn!("Failed to load file {}: {}", path.display(), e);
                    continue;
                }
            };
            let document = RagDocument::new(content, path.to_string_lossy().to_string());
            self.add_document(&mut index, document).await?;
        }

        Ok(index)
    }

    /// Builds the index and persists it to `storage_dir`.
    pub async fn generate(&self, data_dir: &Path, storage_dir: &Path) -> Result<VectorIndex, AgentError> {
        let index = self.build_from_dir(data_dir).await?;
        index.save(storage_dir).await?;
        Ok(index)
    }

    pub async fn add_document(
        &self,
        index: &mut VectorIndex,
        document: RagDocument,
    ) -> Result<(), AgentError> {
        let chunks = self.splitter.split_text(&document.content);
        if chunks.is_empty() {
            log::debug!("Skipping empty document: {}", document.source);
            return Ok(());
        }

        let embeddings = self.embed_model.generate_embeddings(&chunks).await?;
        let total = chunks.len();
        for (i, (chunk, embedding)) in chunks.into_iter().zip(embeddings).enumerate() {
            let mut chunk_doc = RagDocument::new(chunk, document.source.clone())
                .with_chunk_index(i)
                .with_metadata(document.metadata.clone());
            chunk_doc
                .metadata
                .insert("total_chunks".to_string(), total.to_string());
            index.add_node(chunk_doc, embedding)?;
        }

        log::debug!("Indexed {} ({} chunks)", document.source, total);
        Ok(())
    }
}

async fn collect_files(root: &Path) -> Result<Vec<PathBuf>, AgentError> {
    let mut files = Vec::new();
    let mut pending = vec![root.to_path_buf()];

    while let Some(dir) = pending.pop() {
        let mut entries = tokio::fs::read_dir(&dir).await.map_err(|e| {
            AgentError::RagError(format!("Failed to read directory {}: {}", dir.display(), e))
        })?;

        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| AgentError::RagError(format!("Failed to read directory entry: {}", e)))?
        {
            let path = entry.path();
            if path.is_dir() {
                pending.push(path);
            } else if is_indexable(&path) {
                files.push(path);
            }
        }
    }

    files.sort();
    Ok(files)
}

fn is_indexable(path: &Path) -> bool {
    path.extension()
        .map(|ext| ext.to_string_lossy().to_lowercase())
        .is_some_and(|ext| INDEXABLE_EXTENSIONS.contains(&ext.as_str()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rag::DummyEmbeddingGenerator;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_generate_walks_nested_dirs() {
        let data = TempDir::new().unwrap();
        let storage = TempDir::new().unwrap();
        std::fs::create_dir(data.path().join("nested")).unwrap();
        std::fs::write(data.path().join("a.md"), "Schools report grades yearly.").unwrap();
        std::fs::write(data.path().join("nested/b.txt"), "Attendance is tracked daily.").unwrap();
        std::fs::write(data.path().join("image.png"), [0u8, 1, 2]).unwrap();

        let builder = IndexBuilder::new(Arc::new(DummyEmbeddingGenerator::with_dimension(8)));
        let index = builder.generate(data.path(), storage.path()).await.unwrap();

        assert_eq!(index.len(), 2);
        assert!(storage.path().join("index.json").exists());
    }

    #[tokio::test]
    async fn test_long_documents_are_chunked() {
        let builder = IndexBuilder::new(Arc::new(DummyEmbeddingGenerator::with_dimension(8)))
            .with_splitter(TextSplitter::new(16, 0));
        let mut index = VectorIndex::new();
        let doc = RagDocument::new(
            "one two three four five six seven eight".to_string(),
            "long.txt".to_string(),
        );
        builder.add_document(&mut index, doc).await.unwrap();

        assert!(index.len() > 1);
        let first = index.node(0).unwrap();
        assert_eq!(first.document.chunk_index, Some(0));
        assert_eq!(
            first.document.metadata.get("total_chunks"),
            Some(&index.len().to_string())
        );
    }

    #[tokio::test]
    async fn test_missing_data_dir_is_error() {
        let builder = IndexBuilder::new(Arc::new(DummyEmbeddingGenerator::with_dimension(8)));
        let result = builder.build_from_dir(Path::new("/nonexistent/data")).await;
        assert!(matches!(result, Err(AgentError::RagError(_))));
    }
}
