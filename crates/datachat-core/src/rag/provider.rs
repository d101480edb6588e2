use async_trait::async_trait;
use std::path::PathBuf;
use std::sync::Arc;

use crate::errors::AgentError;
use crate::rag::vector_store::INDEX_FILE_NAME;
use crate::rag::{IndexProvider, VectorIndex};

/// Loads the index persisted under the storage directory, if one was generated.
pub struct StorageIndexProvider {
    storage_dir: PathBuf,
}

impl StorageIndexProvider {
    pub fn new(storage_dir: impl Into<PathBuf>) -> Self {
        Self {
            storage_dir: storage_dir.into(),
        }
    }
}

#[async_trait]
impl IndexProvider for StorageIndexProvider {
    async fn get_index(&self) -> Result<Option<Arc<VectorIndex>>, AgentError> {
        let index_file = self.storage_dir.join(INDEX_FILE_NAME);
        if !index_file.is_file() {
            log::info!(
                "No index found in {}, retrieval disabled",
                self.storage_dir.display()
            );
            return Ok(None);
        }

        let index = VectorIndex::load(&self.storage_dir).await?;
        log::info!(
            "Loaded index with {} nodes from {}",
            index.len(),
            self.storage_dir.display()
        );
        Ok(Some(Arc::new(index)))
    }
}
