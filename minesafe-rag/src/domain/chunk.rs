use serde::{Deserialize, Serialize};

use super::{ChunkId, DocType};

/// A bounded passage of one document page, the unit of retrieval.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chunk {
    pub id: ChunkId,
    pub text: String,
    pub source_path: String,
    pub page_number: u32,
    pub doc_type: DocType,
    /// Position of the chunk within its document, increasing across pages.
    pub ordinal: usize,
    pub span: ChunkSpan,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prev: Option<ChunkId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next: Option<ChunkId>,
}

impl Chunk {
    pub fn file_name(&self) -> &str {
        std::path::Path::new(&self.source_path)
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or(&self.source_path)
    }
}

/// Byte range `[start, end)` of the chunk text within its page.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkSpan {
    pub start: usize,
    pub end: usize,
}

impl ChunkSpan {
    pub const fn len(self) -> usize {
        self.end - self.start
    }

    pub const fn is_empty(self) -> bool {
        self.start == self.end
    }
}
