use async_trait::async_trait;

use crate::error::Result;
use crate::index::VectorIndex;

/// Persists a built index as a single artifact.
#[async_trait]
pub trait IndexRepository: Send + Sync {
    /// Replaces any previous artifact; readers never see a partial write.
    async fn save(&self, index: &VectorIndex) -> Result<()>;
    async fn load(&self) -> Result<VectorIndex>;
    async fn exists(&self) -> bool;
}
