pub mod embed;
pub mod generate;
pub mod repository;

pub use embed::EmbeddingGenerator;
pub use generate::{AnswerGenerator, GenerationRequest};
pub use repository::IndexRepository;
