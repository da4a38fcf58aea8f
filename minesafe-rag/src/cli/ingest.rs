use std::path::PathBuf;
use std::sync::Arc;

use console::{Term, style};

use minesafe_rag::Result;
use minesafe_rag::adapters::{self, JsonIndexRepository};
use minesafe_rag::config::Config;
use minesafe_rag::index::{BuildOptions, SnapshotStore};
use minesafe_rag::services::{Chunker, IngestionReport, IngestionService};

use super::print_json;

pub async fn run(
    mut config: Config,
    corpus: Option<PathBuf>,
    chunk_size: Option<usize>,
    chunk_overlap: Option<usize>,
    json: bool,
) -> Result<()> {
    if let Some(corpus) = corpus {
        config.corpus_dir = corpus;
    }
    if let Some(size) = chunk_size {
        config.chunking.chunk_size = size;
    }
    if let Some(overlap) = chunk_overlap {
        config.chunking.chunk_overlap = overlap;
    }
    config.validate()?;

    let chunking = &config.chunking;
    let service = IngestionService::new(
        adapters::build_embedder(&config)?,
        Arc::new(JsonIndexRepository::new(config.index_path.clone())),
        Arc::new(SnapshotStore::new()),
        Chunker::from_config(chunking)?,
        BuildOptions {
            metric: config.retrieval.metric,
            batch_size: config.embedding.batch_size,
            chunk_size: chunking.chunk_size,
            chunk_overlap: chunking.chunk_overlap,
        },
    )
    .with_progress(!json && Term::stderr().is_term());

    let report = service.ingest_dir(&config.corpus_dir).await?;

    if json {
        return print_json(&report);
    }
    print_report(&report, &config);
    Ok(())
}

fn print_report(report: &IngestionReport, config: &Config) {
    println!(
        "{} {} documents, {} pages, {} chunks in {}ms",
        style("Indexed").green().bold(),
        report.documents,
        report.pages,
        report.chunks,
        report.elapsed_ms
    );
    for (doc_type, counts) in &report.by_type {
        println!(
            "  {:<9} {:>4} docs {:>6} pages {:>7} chunks",
            doc_type.as_str(),
            counts.documents,
            counts.pages,
            counts.chunks
        );
    }
    for doc_type in &report.missing_types {
        println!("  {} no {doc_type} documents found", style("!").yellow());
    }
    println!(
        "  embedder {} ({}d), saved to {}",
        report.embedder_model,
        report.dimension,
        config.index_path.display()
    );
}
