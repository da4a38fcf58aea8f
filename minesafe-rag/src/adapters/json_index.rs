use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::io::AsyncWriteExt;
use tracing::info;

use crate::error::{MineRagError, Result};
use crate::index::{IndexEntry, IndexMetadata, VectorIndex};
use crate::ports::IndexRepository;

pub const FORMAT_VERSION: u32 = 1;

#[derive(Serialize)]
struct PersistedIndexRef<'a> {
    format_version: u32,
    metadata: &'a IndexMetadata,
    entries: &'a [IndexEntry],
}

#[derive(Deserialize)]
struct PersistedIndex {
    format_version: u32,
    metadata: IndexMetadata,
    entries: Vec<IndexEntry>,
}

/// Stores the whole index as one JSON document.
#[derive(Debug, Clone)]
pub struct JsonIndexRepository {
    path: PathBuf,
}

impl JsonIndexRepository {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn temp_path(&self) -> PathBuf {
        let name = self
            .path
            .file_name()
            .map_or_else(|| "index".into(), |n| n.to_string_lossy().to_string());
        self.path.with_file_name(format!(".{name}.tmp"))
    }
}

#[async_trait]
impl IndexRepository for JsonIndexRepository {
    async fn save(&self, index: &VectorIndex) -> Result<()> {
        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            tokio::fs::create_dir_all(parent).await?;
        }

        let bytes = serde_json::to_vec(&PersistedIndexRef {
            format_version: FORMAT_VERSION,
            metadata: index.metadata(),
            entries: index.entries(),
        })?;

        let temp = self.temp_path();
        let mut file = tokio::fs::File::create(&temp).await?;
        file.write_all(&bytes).await?;
        file.sync_all().await?;
        drop(file);
        tokio::fs::rename(&temp, &self.path).await?;

        info!(path = %self.path.display(), chunks = index.len(), bytes = bytes.len(), "saved index");
        Ok(())
    }

    async fn load(&self) -> Result<VectorIndex> {
        let bytes = match tokio::fs::read(&self.path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(MineRagError::IndexUnavailable(format!(
                    "no index at {}; run `minesafe ingest` first",
                    self.path.display()
                )));
            }
            Err(e) => return Err(e.into()),
        };

        let persisted: PersistedIndex = serde_json::from_slice(&bytes)
            .map_err(|e| MineRagError::IndexCorrupt(format!("{}: {e}", self.path.display())))?;
        if persisted.format_version != FORMAT_VERSION {
            return Err(MineRagError::IndexCorrupt(format!(
                "unsupported format_version {} (expected {FORMAT_VERSION})",
                persisted.format_version
            )));
        }
        VectorIndex::from_parts(persisted.metadata, persisted.entries)
    }

    async fn exists(&self) -> bool {
        tokio::fs::try_exists(&self.path).await.unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::BuildOptions;
    use crate::test_utils::{StubEmbedder, chunk};
    use pretty_assertions::assert_eq;

    async fn sample_index() -> VectorIndex {
        let embedder = StubEmbedder::constant(vec![0.0, 1.0]).with("helmet", vec![1.0, 0.0]);
        VectorIndex::build(
            vec![chunk("a.pdf", 1, 0, "helmet"), chunk("a.pdf", 2, 0, "vest")],
            &embedder,
            &BuildOptions::default(),
        )
        .await
        .unwrap()
    }

    #[tokio::test]
    async fn test_round_trip_preserves_index() {
        let dir = tempfile::tempdir().unwrap();
        let repo = JsonIndexRepository::new(dir.path().join("nested/index.json"));
        let index = sample_index().await;

        assert!(!repo.exists().await);
        repo.save(&index).await.unwrap();
        assert!(repo.exists().await);
        assert!(!repo.temp_path().exists());

        let loaded = repo.load().await.unwrap();
        assert_eq!(loaded, index);
    }

    #[tokio::test]
    async fn test_missing_file_is_unavailable() {
        let dir = tempfile::tempdir().unwrap();
        let repo = JsonIndexRepository::new(dir.path().join("absent.json"));
        assert!(matches!(
            repo.load().await,
            Err(MineRagError::IndexUnavailable(_))
        ));
    }

    #[tokio::test]
    async fn test_garbage_is_corrupt() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("index.json");
        std::fs::write(&path, b"{\"format_version\": 1, \"metadata\":").unwrap();
        let repo = JsonIndexRepository::new(path.clone());
        assert!(matches!(repo.load().await, Err(MineRagError::IndexCorrupt(_))));
    }

    #[tokio::test]
    async fn test_unknown_version_is_corrupt() {
        let dir = tempfile::tempdir().unwrap();
        let repo = JsonIndexRepository::new(dir.path().join("index.json"));
        repo.save(&sample_index().await).await.unwrap();

        let text = std::fs::read_to_string(repo.path()).unwrap();
        let bumped = text.replacen("\"format_version\":1", "\"format_version\":99", 1);
        std::fs::write(repo.path(), bumped).unwrap();

        assert!(matches!(repo.load().await, Err(MineRagError::IndexCorrupt(_))));
    }
}
