use std::sync::Arc;

use minesafe_rag::Result;
use minesafe_rag::config::Config;
use minesafe_rag::ports::IndexRepository;
use minesafe_rag::server::{self, AppState};

use super::open_pipeline;

/// Starts without an index if none is persisted yet; `/index/reload` picks
/// one up after the first ingestion.
pub async fn run(mut config: Config, bind: Option<String>) -> Result<()> {
    if let Some(bind) = bind {
        config.server.bind = bind;
    }
    let (pipeline, repository) = open_pipeline(&config, false).await?;
    let repository: Arc<dyn IndexRepository> = repository;
    server::serve(AppState::new(pipeline, repository)?, &config.server).await
}
