use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;

use indicatif::{ProgressBar, ProgressStyle};
use serde::Serialize;
use tracing::{info, warn};

use super::chunker::Chunker;
use super::loader::{self, Corpus};
use crate::domain::{DocType, Document};
use crate::error::{MineRagError, Result};
use crate::index::{BuildOptions, SnapshotStore, VectorIndex};
use crate::ports::{EmbeddingGenerator, IndexRepository};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct TypeCounts {
    pub documents: usize,
    pub pages: usize,
    pub chunks: usize,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct IngestionReport {
    pub documents: usize,
    pub pages: usize,
    pub chunks: usize,
    pub by_type: BTreeMap<DocType, TypeCounts>,
    /// Document types that had no input at all.
    pub missing_types: Vec<DocType>,
    pub embedder_model: String,
    pub dimension: usize,
    pub elapsed_ms: u128,
}

/// Load, chunk, embed, persist, install. One writer at a time; a failure at
/// any step leaves both the stored artifact and the live snapshot untouched.
pub struct IngestionService<E, R>
where
    E: EmbeddingGenerator + ?Sized,
    R: IndexRepository + ?Sized,
{
    embedder: Arc<E>,
    repository: Arc<R>,
    snapshots: Arc<SnapshotStore>,
    chunker: Chunker,
    options: BuildOptions,
    show_progress: bool,
}

impl<E, R> IngestionService<E, R>
where
    E: EmbeddingGenerator + ?Sized,
    R: IndexRepository + ?Sized,
{
    pub const fn new(
        embedder: Arc<E>,
        repository: Arc<R>,
        snapshots: Arc<SnapshotStore>,
        chunker: Chunker,
        options: BuildOptions,
    ) -> Self {
        Self {
            embedder,
            repository,
            snapshots,
            chunker,
            options,
            show_progress: false,
        }
    }

    #[must_use]
    pub const fn with_progress(mut self, show: bool) -> Self {
        self.show_progress = show;
        self
    }

    pub async fn ingest_dir(&self, root: &Path) -> Result<IngestionReport> {
        let owned = root.to_path_buf();
        let corpus = tokio::task::spawn_blocking(move || loader::load_corpus(&owned))
            .await
            .map_err(|e| MineRagError::InvalidDocument(format!("corpus loader panicked: {e}")))??;
        self.ingest_corpus(corpus).await
    }

    pub async fn ingest_documents(&self, documents: Vec<Document>) -> Result<IngestionReport> {
        self.ingest_corpus(Corpus {
            documents,
            missing: Vec::new(),
        })
        .await
    }

    async fn ingest_corpus(&self, corpus: Corpus) -> Result<IngestionReport> {
        let started = Instant::now();
        let mut report = IngestionReport {
            missing_types: corpus.missing.clone(),
            ..IngestionReport::default()
        };

        let mut chunks = Vec::new();
        for document in &corpus.documents {
            let doc_chunks = self.chunker.chunk(document);
            let counts = report.by_type.entry(document.doc_type()).or_default();
            counts.documents += 1;
            counts.pages += document.pages().len();
            counts.chunks += doc_chunks.len();
            info!(
                source = document.source_path(),
                pages = document.pages().len(),
                chunks = doc_chunks.len(),
                "chunked"
            );
            chunks.extend(doc_chunks);
        }
        report.documents = corpus.documents.len();
        report.pages = report.by_type.values().map(|c| c.pages).sum();
        report.chunks = chunks.len();

        if chunks.is_empty() {
            warn!("corpus produced no chunks; the index will be empty");
        }

        let progress = self.progress_bar(chunks.len());
        let index = VectorIndex::build_with_progress(
            chunks,
            self.embedder.as_ref(),
            &self.options,
            |n| progress.inc(n as u64),
        )
        .await;
        progress.finish_and_clear();
        let index = index?;

        self.repository.save(&index).await?;
        report.embedder_model = index.metadata().embedder_model.clone();
        report.dimension = index.metadata().dimension;
        self.snapshots.install(index).await;

        report.elapsed_ms = started.elapsed().as_millis();
        info!(
            documents = report.documents,
            pages = report.pages,
            chunks = report.chunks,
            elapsed_ms = report.elapsed_ms,
            "ingestion complete"
        );
        Ok(report)
    }

    fn progress_bar(&self, total: usize) -> ProgressBar {
        if !self.show_progress {
            return ProgressBar::hidden();
        }
        let bar = ProgressBar::new(total as u64);
        if let Ok(style) = ProgressStyle::default_bar().template("{msg} [{bar:40}] {pos}/{len}") {
            bar.set_style(style);
        }
        bar.set_message("Embedding");
        bar
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::JsonIndexRepository;
    use crate::test_utils::{FailingEmbedder, StubEmbedder};

    fn service<E: EmbeddingGenerator>(
        embedder: E,
        path: &Path,
        snapshots: Arc<SnapshotStore>,
    ) -> IngestionService<E, JsonIndexRepository> {
        IngestionService::new(
            Arc::new(embedder),
            Arc::new(JsonIndexRepository::new(path)),
            snapshots,
            Chunker::new(60, 10).unwrap(),
            BuildOptions {
                batch_size: 2,
                chunk_size: 60,
                chunk_overlap: 10,
                ..BuildOptions::default()
            },
        )
    }

    fn docs() -> Vec<Document> {
        vec![
            Document::new(
                "manuals/ppe.pdf",
                DocType::Manual,
                [
                    "Helmets must be worn in all operational areas of the mine site at all times.",
                    "",
                ],
            )
            .unwrap(),
            Document::new(
                "bulletins/vests.pdf",
                DocType::Bulletin,
                ["Hi-vis vests are required on haul roads."],
            )
            .unwrap(),
        ]
    }

    #[tokio::test]
    async fn test_ingest_saves_and_installs() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("index.json");
        let snapshots = Arc::new(SnapshotStore::new());
        let svc = service(StubEmbedder::constant(vec![1.0, 0.0]), &path, snapshots.clone());

        let report = svc.ingest_documents(docs()).await.unwrap();

        assert_eq!(report.documents, 2);
        assert_eq!(report.pages, 3);
        assert_eq!(report.by_type[&DocType::Manual].documents, 1);
        assert_eq!(report.by_type[&DocType::Bulletin].chunks, 1);
        assert!(path.exists());
        assert_eq!(snapshots.current().await.unwrap().len(), report.chunks);
    }

    #[tokio::test]
    async fn test_failed_build_keeps_previous_snapshot() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("index.json");
        let snapshots = Arc::new(SnapshotStore::new());

        service(StubEmbedder::constant(vec![1.0, 0.0, 0.0]), &path, snapshots.clone())
            .ingest_documents(docs())
            .await
            .unwrap();
        let before = snapshots.current().await.unwrap();
        let saved = std::fs::read(&path).unwrap();

        let result = service(FailingEmbedder::new(3, 0), &path, snapshots.clone())
            .ingest_documents(docs())
            .await;

        assert!(matches!(result, Err(MineRagError::EmbeddingFailure(_))));
        assert!(Arc::ptr_eq(&before, &snapshots.current().await.unwrap()));
        assert_eq!(std::fs::read(&path).unwrap(), saved);
    }

    #[tokio::test]
    async fn test_empty_corpus_builds_empty_index() {
        let dir = tempfile::tempdir().unwrap();
        let snapshots = Arc::new(SnapshotStore::new());
        let svc = service(
            StubEmbedder::constant(vec![1.0]),
            &dir.path().join("index.json"),
            snapshots.clone(),
        );

        let report = svc.ingest_documents(Vec::new()).await.unwrap();
        assert_eq!(report.chunks, 0);
        assert!(snapshots.current().await.unwrap().is_empty());
    }
}
