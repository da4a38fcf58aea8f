use thiserror::Error;

#[derive(Error, Debug)]
pub enum MineRagError {
    #[error("Invalid query: {0}")]
    InvalidQuery(String),

    #[error("No index available: {0}")]
    IndexUnavailable(String),

    #[error("Index artifact is corrupt: {0}")]
    IndexCorrupt(String),

    #[error("Embedding failed: {0}")]
    EmbeddingFailure(String),

    #[error("Answer generation unavailable: {0}")]
    GenerationUnavailable(String),

    #[error("Vector dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("Invalid document: {0}")]
    InvalidDocument(String),

    #[error("Invalid detection: {0}")]
    InvalidDetection(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Metrics error: {0}")]
    Metrics(#[from] prometheus::Error),
}

impl MineRagError {
    pub const fn exit_code(&self) -> i32 {
        match self {
            Self::InvalidQuery(_) => 1,
            Self::IndexUnavailable(_) => 2,
            Self::IndexCorrupt(_) => 3,
            Self::InvalidDocument(_) | Self::InvalidDetection(_) | Self::Config(_) => 4,
            Self::EmbeddingFailure(_) | Self::DimensionMismatch { .. } => 5,
            Self::GenerationUnavailable(_) => 6,
            Self::Io(_) | Self::Serialization(_) | Self::Http(_) | Self::Metrics(_) => 10,
        }
    }

    /// Folds a collaborator error into `EmbeddingFailure`.
    #[must_use]
    pub fn into_embedding_failure(self) -> Self {
        match self {
            Self::EmbeddingFailure(_) | Self::DimensionMismatch { .. } => self,
            other => Self::EmbeddingFailure(other.to_string()),
        }
    }

    /// Folds a collaborator error into `GenerationUnavailable`.
    #[must_use]
    pub fn into_generation_unavailable(self) -> Self {
        match self {
            Self::GenerationUnavailable(_) => self,
            other => Self::GenerationUnavailable(other.to_string()),
        }
    }

    /// Stable machine-readable name used in API error bodies.
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::InvalidQuery(_) => "invalid_query",
            Self::IndexUnavailable(_) => "index_unavailable",
            Self::IndexCorrupt(_) => "index_corrupt",
            Self::EmbeddingFailure(_) | Self::DimensionMismatch { .. } => "embedding_failure",
            Self::GenerationUnavailable(_) => "generation_unavailable",
            Self::InvalidDocument(_) => "invalid_document",
            Self::InvalidDetection(_) => "invalid_detection",
            Self::Config(_) => "config",
            Self::Io(_) => "io",
            Self::Serialization(_) => "serialization",
            Self::Http(_) => "http",
            Self::Metrics(_) => "metrics",
        }
    }
}

pub type Result<T> = std::result::Result<T, MineRagError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_groups_dimension_mismatch_with_embedding() {
        let err = MineRagError::DimensionMismatch {
            expected: 3,
            actual: 4,
        };
        assert_eq!(err.kind(), "embedding_failure");
        assert_eq!(err.exit_code(), 5);
    }

    #[test]
    fn test_display_messages() {
        let err = MineRagError::InvalidQuery("query text must not be empty".into());
        assert_eq!(err.to_string(), "Invalid query: query text must not be empty");
    }
}
