use std::sync::Arc;

use tracing::debug;

use crate::domain::RetrievedPassage;
use crate::error::{MineRagError, Result};
use crate::index::VectorIndex;
use crate::ports::EmbeddingGenerator;

/// Embeds a query and looks it up in one index snapshot.
pub struct Retriever<E>
where
    E: EmbeddingGenerator + ?Sized,
{
    embedder: Arc<E>,
    index: Arc<VectorIndex>,
}

impl<E> Retriever<E>
where
    E: EmbeddingGenerator + ?Sized,
{
    pub const fn new(embedder: Arc<E>, index: Arc<VectorIndex>) -> Self {
        Self { embedder, index }
    }

    pub fn index(&self) -> &VectorIndex {
        &self.index
    }

    pub async fn answer_query(&self, query: &str, k: usize) -> Result<Vec<RetrievedPassage>> {
        let query = validate_query(query)?;
        if k == 0 {
            return Err(MineRagError::InvalidQuery(
                "top_k must be at least 1".to_string(),
            ));
        }

        let vector = self
            .embedder
            .embed(query)
            .await
            .map_err(MineRagError::into_embedding_failure)?;
        self.retrieve_by_vector(&vector, k)
    }

    /// Looks up an already embedded query.
    pub fn retrieve_by_vector(&self, vector: &[f32], k: usize) -> Result<Vec<RetrievedPassage>> {
        let passages: Vec<RetrievedPassage> = self
            .index
            .query(vector, k)?
            .into_iter()
            .enumerate()
            .map(|(i, scored)| RetrievedPassage {
                rank: i + 1,
                score: scored.score,
                chunk: scored.chunk.clone(),
            })
            .collect();

        debug!(
            k,
            returned = passages.len(),
            top_score = passages.first().map(|p| p.score),
            "retrieved passages"
        );
        Ok(passages)
    }
}

/// Trims `query` and rejects it when nothing is left.
pub fn validate_query(query: &str) -> Result<&str> {
    let trimmed = query.trim();
    if trimmed.is_empty() {
        return Err(MineRagError::InvalidQuery(
            "query text must not be empty".to_string(),
        ));
    }
    Ok(trimmed)
}
