use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::{Parser, Subcommand};
use console::style;
use serde::Serialize;
use tracing::{info, warn};

use minesafe_rag::adapters::{self, JsonIndexRepository};
use minesafe_rag::config::Config;
use minesafe_rag::index::{SnapshotStore, VectorIndex};
use minesafe_rag::ports::{EmbeddingGenerator, IndexRepository};
use minesafe_rag::server::{DynPipeline, Reference};
use minesafe_rag::services::QueryPipeline;
use minesafe_rag::{MineRagError, Result};

mod hazard;
mod ingest;
mod query;
mod serve;
mod status;

#[derive(Parser)]
#[command(name = "minesafe")]
#[command(about = "Cited answers and PPE hazard checklists from mining safety documents")]
#[command(version)]
pub struct Cli {
    #[arg(long, global = true, help = "Output as JSON")]
    pub json: bool,

    #[arg(short, long, global = true, help = "Enable debug logging")]
    pub verbose: bool,

    #[arg(long, global = true, help = "Read configuration from this file only")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    #[command(about = "Chunk, embed and persist the document corpus")]
    Ingest {
        #[arg(long, help = "Directory of extracted page records")]
        corpus: Option<PathBuf>,

        #[arg(long, help = "Maximum characters per chunk")]
        chunk_size: Option<usize>,

        #[arg(long, help = "Characters shared by consecutive chunks")]
        chunk_overlap: Option<usize>,
    },

    #[command(about = "Ask a question and get a cited answer")]
    Query {
        #[arg(help = "Question text")]
        text: String,

        #[arg(long, help = "Number of passages to retrieve")]
        top_k: Option<usize>,

        #[arg(long, help = "Return ranked passages without generating an answer")]
        retrieve_only: bool,
    },

    #[command(about = "Turn PPE detections into a hazard summary and checklist")]
    Hazard {
        #[arg(help = "JSON file holding an array of detections")]
        detections: PathBuf,

        #[arg(long, help = "Number of passages to retrieve")]
        top_k: Option<usize>,

        #[arg(long, help = "Minimum detection confidence")]
        conf: Option<f32>,
    },

    #[command(about = "Start the HTTP query API")]
    Serve {
        #[arg(long, help = "Address to listen on (e.g., '0.0.0.0:8000')")]
        bind: Option<String>,
    },

    #[command(about = "Show index metadata and chunk counts")]
    Status,
}

pub async fn run(cli: Cli) -> Result<()> {
    let config = load_config(cli.config.as_deref())?;
    match cli.command {
        Commands::Ingest {
            corpus,
            chunk_size,
            chunk_overlap,
        } => ingest::run(config, corpus, chunk_size, chunk_overlap, cli.json).await,
        Commands::Query {
            text,
            top_k,
            retrieve_only,
        } => query::run(&config, &text, top_k, retrieve_only, cli.json).await,
        Commands::Hazard {
            detections,
            top_k,
            conf,
        } => hazard::run(&config, &detections, top_k, conf, cli.json).await,
        Commands::Serve { bind } => serve::run(config, bind).await,
        Commands::Status => status::run(&config, cli.json).await,
    }
}

fn load_config(path: Option<&Path>) -> Result<Config> {
    match path {
        Some(path) if !path.exists() => Err(MineRagError::Config(format!(
            "config file {} does not exist",
            path.display()
        ))),
        Some(path) => Config::load_from(path),
        None => Config::load(),
    }
}

/// Builds the query pipeline and installs the persisted index, if any.
///
/// With `require_index` a missing or incompatible index is an error; without
/// it the pipeline starts empty and requests answer `IndexUnavailable` until
/// a reload succeeds.
async fn open_pipeline(
    config: &Config,
    require_index: bool,
) -> Result<(DynPipeline, Arc<JsonIndexRepository>)> {
    config.validate()?;
    let embedder = adapters::build_embedder(config)?;
    let generator = adapters::build_generator(config)?;
    let repository = Arc::new(JsonIndexRepository::new(config.index_path.clone()));
    let snapshots = Arc::new(SnapshotStore::new());

    match load_compatible(&repository, embedder.as_ref()).await {
        Ok(index) => {
            info!(chunks = index.len(), path = %repository.path().display(), "index loaded");
            snapshots.install(index).await;
        }
        Err(err) if require_index => return Err(err),
        Err(err) => warn!(error = %err, "starting without an index"),
    }

    let pipeline = QueryPipeline::new(embedder, generator, snapshots, config)?;
    Ok((pipeline, repository))
}

async fn load_compatible(
    repository: &JsonIndexRepository,
    embedder: &dyn EmbeddingGenerator,
) -> Result<VectorIndex> {
    let index = repository.load().await?;
    index.metadata().check_compatible(embedder)?;
    Ok(index)
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn print_references(references: &[Reference]) {
    if references.is_empty() {
        println!("{}", style("No passages retrieved.").dim());
        return;
    }
    println!("{}", style("Sources").bold());
    for reference in references {
        println!(
            "  [{}] {} p.{} ({}) {}",
            reference.rank,
            style(&reference.source_path).cyan(),
            reference.page_number,
            reference.doc_type,
            style(format!("{:.3}", reference.score)).dim()
        );
    }
}

fn print_degraded(kind: &str, message: &str) {
    eprintln!(
        "{} {} ({kind})",
        style("degraded:").yellow().bold(),
        message
    );
}

/// Cuts `text` to at most `max` characters, on a char boundary.
fn snippet(text: &str, max: usize) -> String {
    let text = text.trim();
    match text.char_indices().nth(max) {
        Some((cut, _)) => format!("{}...", &text[..cut]),
        None => text.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_parses_global_flags_after_subcommand() {
        let cli = Cli::try_parse_from([
            "minesafe", "query", "what PPE is required?", "--top-k", "3", "--json",
        ])
        .unwrap();
        assert!(cli.json);
        match cli.command {
            Commands::Query {
                text,
                top_k,
                retrieve_only,
            } => {
                assert_eq!(text, "what PPE is required?");
                assert_eq!(top_k, Some(3));
                assert!(!retrieve_only);
            }
            _ => panic!("expected query command"),
        }
    }

    #[test]
    fn test_hazard_requires_detections_file() {
        assert!(Cli::try_parse_from(["minesafe", "hazard"]).is_err());
    }

    #[test]
    fn test_missing_config_file_is_config_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = load_config(Some(&dir.path().join("absent.toml"))).unwrap_err();
        assert_eq!(err.exit_code(), 4);
    }

    #[test]
    fn test_snippet_respects_char_boundaries() {
        assert_eq!(snippet("  short  ", 10), "short");
        assert_eq!(snippet("ééééé", 2), "éé...");
    }
}
