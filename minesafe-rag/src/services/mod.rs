pub mod chunker;
pub mod hazard;
pub mod ingestion;
pub mod loader;
pub mod pipeline;
pub mod retrieval;
pub mod synthesis;

pub use chunker::Chunker;
pub use hazard::HazardBridge;
pub use ingestion::{IngestionReport, IngestionService, TypeCounts};
pub use loader::{Corpus, load_corpus};
pub use pipeline::{
    AnswerOutcome, Budgets, HazardOutcome, QueryPipeline, RetrieveOutcome, StageError, Status,
};
pub use retrieval::Retriever;
pub use synthesis::AnswerSynthesizer;
