//! Exact nearest-neighbour index over chunk embeddings.
//!
//! An index is built once from the full chunk set and never mutated; new
//! ingestion runs build a fresh index and swap it in through
//! [`SnapshotStore`].

mod snapshot;

pub use snapshot::SnapshotStore;

use std::cmp::Ordering;
use std::collections::{BTreeMap, HashSet};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::domain::{Chunk, ChunkId, DocType, Metric};
use crate::error::{MineRagError, Result};
use crate::ports::EmbeddingGenerator;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexMetadata {
    pub embedder_model: String,
    pub dimension: usize,
    pub metric: Metric,
    pub chunk_size: usize,
    pub chunk_overlap: usize,
    pub built_at: DateTime<Utc>,
}

impl IndexMetadata {
    /// Queries must be embedded by the same model the index was built with.
    pub fn check_compatible<E>(&self, embedder: &E) -> Result<()>
    where
        E: EmbeddingGenerator + ?Sized,
    {
        if embedder.model_name() != self.embedder_model || embedder.dimension() != self.dimension {
            return Err(MineRagError::IndexUnavailable(format!(
                "index was built with {} ({}d) but the configured embedder is {} ({}d); re-run ingestion",
                self.embedder_model,
                self.dimension,
                embedder.model_name(),
                embedder.dimension()
            )));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexEntry {
    pub chunk: Chunk,
    /// Stored L2-normalised when the metric is cosine.
    pub embedding: Vec<f32>,
}

#[derive(Debug, Clone)]
pub struct BuildOptions {
    pub metric: Metric,
    pub batch_size: usize,
    pub chunk_size: usize,
    pub chunk_overlap: usize,
}

impl Default for BuildOptions {
    fn default() -> Self {
        Self {
            metric: Metric::Cosine,
            batch_size: 64,
            chunk_size: 800,
            chunk_overlap: 200,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScoredChunk<'a> {
    pub chunk: &'a Chunk,
    pub score: f32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct VectorIndex {
    metadata: IndexMetadata,
    entries: Vec<IndexEntry>,
}

impl VectorIndex {
    pub async fn build<E>(chunks: Vec<Chunk>, embedder: &E, options: &BuildOptions) -> Result<Self>
    where
        E: EmbeddingGenerator + ?Sized,
    {
        Self::build_with_progress(chunks, embedder, options, |_| {}).await
    }

    /// Embeds every chunk and builds the index. Any embedding error fails the
    /// whole build; there is no partial index.
    ///
    /// `on_progress` receives the number of chunks embedded by each batch.
    pub async fn build_with_progress<E, F>(
        chunks: Vec<Chunk>,
        embedder: &E,
        options: &BuildOptions,
        mut on_progress: F,
    ) -> Result<Self>
    where
        E: EmbeddingGenerator + ?Sized,
        F: FnMut(usize) + Send,
    {
        let dimension = embedder.dimension();
        if dimension == 0 {
            return Err(MineRagError::EmbeddingFailure(format!(
                "embedder {} reports dimension 0",
                embedder.model_name()
            )));
        }
        ensure_unique_ids(chunks.iter().map(|c| &c.id))?;

        let mut embeddings = Vec::with_capacity(chunks.len());
        for batch in chunks.chunks(options.batch_size.max(1)) {
            let texts: Vec<&str> = batch.iter().map(|c| c.text.as_str()).collect();
            let vectors = embedder
                .embed_batch(&texts)
                .await
                .map_err(MineRagError::into_embedding_failure)?;

            if vectors.len() != batch.len() {
                return Err(MineRagError::EmbeddingFailure(format!(
                    "embedder returned {} vectors for {} chunks",
                    vectors.len(),
                    batch.len()
                )));
            }

            for vector in vectors {
                validate_vector(&vector, dimension)?;
                embeddings.push(prepare(vector, options.metric));
            }
            debug!(batch = batch.len(), done = embeddings.len(), "embedded batch");
            on_progress(batch.len());
        }

        let entries: Vec<IndexEntry> = chunks
            .into_iter()
            .zip(embeddings)
            .map(|(chunk, embedding)| IndexEntry { chunk, embedding })
            .collect();

        let metadata = IndexMetadata {
            embedder_model: embedder.model_name().to_string(),
            dimension,
            metric: options.metric,
            chunk_size: options.chunk_size,
            chunk_overlap: options.chunk_overlap,
            built_at: Utc::now(),
        };
        info!(
            chunks = entries.len(),
            dimension,
            model = %metadata.embedder_model,
            "built vector index"
        );
        Ok(Self { metadata, entries })
    }

    /// Reassembles an index from persisted parts, re-checking every invariant
    /// a freshly built index has.
    pub fn from_parts(metadata: IndexMetadata, entries: Vec<IndexEntry>) -> Result<Self> {
        if metadata.dimension == 0 {
            return Err(MineRagError::IndexCorrupt("dimension is 0".to_string()));
        }
        ensure_unique_ids(entries.iter().map(|e| &e.chunk.id))
            .map_err(|e| MineRagError::IndexCorrupt(e.to_string()))?;
        for entry in &entries {
            validate_vector(&entry.embedding, metadata.dimension).map_err(|e| {
                MineRagError::IndexCorrupt(format!("{}: {e}", entry.chunk.id))
            })?;
            if entry.chunk.page_number == 0 {
                return Err(MineRagError::IndexCorrupt(format!(
                    "{}: page numbers are 1-based",
                    entry.chunk.id
                )));
            }
        }
        Ok(Self { metadata, entries })
    }

    /// Top-`k` chunks by similarity, best first. Ties go to the smaller chunk
    /// id. `k` larger than the index is clamped.
    pub fn query(&self, vector: &[f32], k: usize) -> Result<Vec<ScoredChunk<'_>>> {
        if k == 0 {
            return Err(MineRagError::InvalidQuery(
                "top_k must be at least 1".to_string(),
            ));
        }
        if self.entries.is_empty() {
            return Ok(Vec::new());
        }
        validate_vector(vector, self.metadata.dimension)?;

        let query = prepare(vector.to_vec(), self.metadata.metric);
        let mut scored: Vec<ScoredChunk<'_>> = self
            .entries
            .iter()
            .map(|entry| ScoredChunk {
                chunk: &entry.chunk,
                score: self.similarity(&query, &entry.embedding),
            })
            .collect();

        let k = k.min(scored.len());
        if k < scored.len() {
            scored.select_nth_unstable_by(k - 1, rank_order);
            scored.truncate(k);
        }
        scored.sort_by(rank_order);
        Ok(scored)
    }

    fn similarity(&self, query: &[f32], stored: &[f32]) -> f32 {
        let dot = dot(query, stored);
        match self.metadata.metric {
            Metric::Cosine => dot.clamp(-1.0, 1.0),
            Metric::InnerProduct => dot,
        }
    }

    pub const fn metadata(&self) -> &IndexMetadata {
        &self.metadata
    }

    pub fn entries(&self) -> &[IndexEntry] {
        &self.entries
    }

    pub fn get(&self, id: &ChunkId) -> Option<&Chunk> {
        self.entries
            .iter()
            .map(|e| &e.chunk)
            .find(|chunk| &chunk.id == id)
    }

    pub const fn len(&self) -> usize {
        self.entries.len()
    }

    pub const fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn chunk_counts(&self) -> BTreeMap<DocType, usize> {
        let mut counts = BTreeMap::new();
        for entry in &self.entries {
            *counts.entry(entry.chunk.doc_type).or_default() += 1;
        }
        counts
    }
}

fn rank_order(a: &ScoredChunk<'_>, b: &ScoredChunk<'_>) -> Ordering {
    b.score
        .total_cmp(&a.score)
        .then_with(|| a.chunk.id.cmp(&b.chunk.id))
}

fn ensure_unique_ids<'a>(ids: impl Iterator<Item = &'a ChunkId>) -> Result<()> {
    let mut seen = HashSet::new();
    for id in ids {
        if !seen.insert(id) {
            return Err(MineRagError::InvalidDocument(format!(
                "duplicate chunk id {id}"
            )));
        }
    }
    Ok(())
}

fn validate_vector(vector: &[f32], dimension: usize) -> Result<()> {
    if vector.len() != dimension {
        return Err(MineRagError::DimensionMismatch {
            expected: dimension,
            actual: vector.len(),
        });
    }
    if vector.iter().any(|x| !x.is_finite()) {
        return Err(MineRagError::EmbeddingFailure(
            "embedding contains non-finite values".to_string(),
        ));
    }
    Ok(())
}

fn prepare(mut vector: Vec<f32>, metric: Metric) -> Vec<f32> {
    if metric == Metric::Cosine {
        let norm = dot(&vector, &vector).sqrt();
        if norm > 0.0 {
            for x in &mut vector {
                *x /= norm;
            }
        }
    }
    vector
}

fn dot(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}
