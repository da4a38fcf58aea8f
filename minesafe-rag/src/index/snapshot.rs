use std::sync::Arc;

use tokio::sync::RwLock;
use tracing::info;

use super::VectorIndex;
use crate::error::{MineRagError, Result};

/// Holds the index snapshot queries run against.
///
/// Readers clone the `Arc` and drop the lock at once, so a swap never waits on
/// an in-flight query and a query never sees a half-installed index.
#[derive(Debug, Default)]
pub struct SnapshotStore {
    current: RwLock<Option<Arc<VectorIndex>>>,
}

impl SnapshotStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_index(index: VectorIndex) -> Self {
        Self {
            current: RwLock::new(Some(Arc::new(index))),
        }
    }

    pub async fn current(&self) -> Result<Arc<VectorIndex>> {
        self.try_current().await.ok_or_else(|| {
            MineRagError::IndexUnavailable("no index has been built yet; run `minesafe ingest`".to_string())
        })
    }

    pub async fn try_current(&self) -> Option<Arc<VectorIndex>> {
        self.current.read().await.clone()
    }

    /// Swaps in `index` and returns the snapshot it replaced.
    pub async fn install(&self, index: VectorIndex) -> Option<Arc<VectorIndex>> {
        let next = Arc::new(index);
        let chunks = next.len();
        let previous = self.current.write().await.replace(next);
        info!(chunks, replaced = previous.is_some(), "installed index snapshot");
        previous
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::BuildOptions;
    use crate::test_utils::{StubEmbedder, chunk};

    async fn index_of(n: usize) -> VectorIndex {
        let chunks = (0..n).map(|i| chunk("snap.pdf", 1, i, "text")).collect();
        VectorIndex::build(
            chunks,
            &StubEmbedder::constant(vec![1.0, 0.0]),
            &BuildOptions::default(),
        )
        .await
        .unwrap()
    }

    #[tokio::test]
    async fn test_empty_store_is_unavailable() {
        let store = SnapshotStore::new();
        assert!(store.try_current().await.is_none());
        assert!(matches!(
            store.current().await,
            Err(MineRagError::IndexUnavailable(_))
        ));
    }

    #[tokio::test]
    async fn test_install_replaces_snapshot() {
        let store = SnapshotStore::with_index(index_of(1).await);
        let held = store.current().await.unwrap();

        let previous = store.install(index_of(3).await).await;
        assert_eq!(previous.map(|p| p.len()), Some(1));
        assert_eq!(store.current().await.unwrap().len(), 3);
        // Readers holding the old snapshot keep a complete index.
        assert_eq!(held.len(), 1);
    }

    #[tokio::test]
    async fn test_concurrent_readers_see_whole_snapshots() {
        let store = Arc::new(SnapshotStore::with_index(index_of(2).await));
        let mut readers = Vec::new();
        for _ in 0..8 {
            let store = Arc::clone(&store);
            readers.push(tokio::spawn(async move {
                let mut sizes = Vec::new();
                for _ in 0..50 {
                    sizes.push(store.current().await.unwrap().len());
                    tokio::task::yield_now().await;
                }
                sizes
            }));
        }
        store.install(index_of(5).await).await;

        for reader in readers {
            for size in reader.await.unwrap() {
                assert!(size == 2 || size == 5);
            }
        }
    }
}
