use std::collections::BTreeMap;
use std::path::PathBuf;

use console::style;
use serde::Serialize;

use minesafe_rag::Result;
use minesafe_rag::adapters::JsonIndexRepository;
use minesafe_rag::config::Config;
use minesafe_rag::domain::DocType;
use minesafe_rag::index::IndexMetadata;
use minesafe_rag::ports::IndexRepository;

use super::print_json;

#[derive(Debug, Serialize)]
struct StatusReport {
    index_path: PathBuf,
    exists: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    metadata: Option<IndexMetadata>,
    chunks: usize,
    by_type: BTreeMap<DocType, usize>,
}

pub async fn run(config: &Config, json: bool) -> Result<()> {
    let repository = JsonIndexRepository::new(config.index_path.clone());
    let mut report = StatusReport {
        index_path: config.index_path.clone(),
        exists: repository.exists().await,
        metadata: None,
        chunks: 0,
        by_type: BTreeMap::new(),
    };
    if report.exists {
        let index = repository.load().await?;
        report.chunks = index.len();
        report.by_type = index.chunk_counts();
        report.metadata = Some(index.metadata().clone());
    }

    if json {
        return print_json(&report);
    }
    print_status(&report);
    Ok(())
}

fn print_status(report: &StatusReport) {
    println!("{} {}", style("Index:").bold(), report.index_path.display());
    let Some(metadata) = &report.metadata else {
        println!("  {} run `minesafe ingest` to build one", style("not built").yellow());
        return;
    };
    println!(
        "  embedder  {} ({}d, {:?})",
        metadata.embedder_model, metadata.dimension, metadata.metric
    );
    println!(
        "  chunking  size {} overlap {}",
        metadata.chunk_size, metadata.chunk_overlap
    );
    println!("  built     {}", metadata.built_at.to_rfc3339());
    println!("  chunks    {}", report.chunks);
    for doc_type in DocType::ALL {
        let count = report.by_type.get(&doc_type).copied().unwrap_or(0);
        println!("    {:<9} {count:>7}", doc_type.as_str());
    }
}
