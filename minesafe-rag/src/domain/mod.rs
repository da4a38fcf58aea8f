pub mod chunk;
pub mod document;
pub mod hazard;
pub mod id;
pub mod search;

pub use chunk::{Chunk, ChunkSpan};
pub use document::{DocType, Document, Page, PageRecord};
pub use hazard::{Detection, HazardSummary, PpeClass, RiskLevel};
pub use id::{ChunkId, RequestId};
pub use search::{Citation, Metric, RetrievedPassage, SynthesizedAnswer};
