use std::sync::Arc;

use async_trait::async_trait;
use fastembed::{EmbeddingModel, InitOptions, TextEmbedding};

use crate::error::{MineRagError, Result};
use crate::ports::EmbeddingGenerator;

/// Local ONNX embeddings (all-MiniLM-L6-v2, 384 dimensions).
pub struct FastEmbedder {
    model: Arc<TextEmbedding>,
    batch_size: usize,
}

impl FastEmbedder {
    pub const MODEL_NAME: &'static str = "all-MiniLM-L6-v2";
    pub const DIMENSION: usize = 384;

    pub fn new(batch_size: usize) -> Result<Self> {
        let model = TextEmbedding::try_new(InitOptions::new(EmbeddingModel::AllMiniLML6V2))
            .map_err(|e| MineRagError::EmbeddingFailure(format!("failed to load model: {e}")))?;
        Ok(Self {
            model: Arc::new(model),
            batch_size,
        })
    }
}

#[async_trait]
impl EmbeddingGenerator for FastEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let mut vectors = self.embed_batch(&[text]).await?;
        vectors
            .pop()
            .ok_or_else(|| MineRagError::EmbeddingFailure("model returned no vector".to_string()))
    }

    async fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
        let owned: Vec<String> = texts.iter().map(|t| (*t).to_string()).collect();
        let model = Arc::clone(&self.model);
        let batch_size = self.batch_size;
        tokio::task::spawn_blocking(move || model.embed(owned, Some(batch_size)))
            .await
            .map_err(|e| MineRagError::EmbeddingFailure(e.to_string()))?
            .map_err(|e| MineRagError::EmbeddingFailure(e.to_string()))
    }

    fn dimension(&self) -> usize {
        Self::DIMENSION
    }

    fn model_name(&self) -> &str {
        Self::MODEL_NAME
    }
}
