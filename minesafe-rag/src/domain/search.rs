use serde::{Deserialize, Serialize};

use super::{Chunk, ChunkId, DocType};

/// A chunk returned for a query, with its similarity score and 1-based rank.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetrievedPassage {
    pub rank: usize,
    pub score: f32,
    pub chunk: Chunk,
}

/// Links a span of answer text to one retrieved passage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Citation {
    /// 1-based position of the passage in the retrieved set.
    pub index: usize,
    pub chunk_id: ChunkId,
    pub source_path: String,
    pub page_number: u32,
    pub doc_type: DocType,
    /// Byte range of the answer text supported by this passage.
    pub span_start: usize,
    pub span_end: usize,
}

impl Citation {
    pub fn for_passage(index: usize, passage: &RetrievedPassage, span: (usize, usize)) -> Self {
        Self {
            index,
            chunk_id: passage.chunk.id.clone(),
            source_path: passage.chunk.source_path.clone(),
            page_number: passage.chunk.page_number,
            doc_type: passage.chunk.doc_type,
            span_start: span.0,
            span_end: span.1,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SynthesizedAnswer {
    pub text: String,
    pub citations: Vec<Citation>,
}

/// Similarity function used by the vector index.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Metric {
    #[default]
    Cosine,
    InnerProduct,
}

impl std::str::FromStr for Metric {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "cosine" => Ok(Self::Cosine),
            "inner_product" | "ip" | "dot" => Ok(Self::InnerProduct),
            _ => Err(format!("Unknown similarity metric: {s}")),
        }
    }
}
