//! Per-request query chains with time budgets and degraded responses.
//!
//! Client errors (bad query, no index) are returned as `Err`. Collaborator
//! failures are not: the request still answers, with `status = degraded` and
//! the failure named in `error`, so callers can tell "nothing relevant" from
//! "could not look".

use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tokio::time::Instant;
use tracing::warn;

use super::hazard::HazardBridge;
use super::retrieval::{Retriever, validate_query};
use super::synthesis::AnswerSynthesizer;
use crate::config::{Config, RetrievalConfig};
use crate::domain::{Citation, Detection, HazardSummary, RetrievedPassage};
use crate::error::{MineRagError, Result};
use crate::index::SnapshotStore;
use crate::ports::{AnswerGenerator, EmbeddingGenerator};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    Ok,
    Degraded,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StageError {
    pub kind: &'static str,
    pub message: String,
}

impl From<&MineRagError> for StageError {
    fn from(err: &MineRagError) -> Self {
        Self {
            kind: err.kind(),
            message: err.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RetrieveOutcome {
    pub query: String,
    pub passages: Vec<RetrievedPassage>,
    pub status: Status,
    pub error: Option<StageError>,
}

impl RetrieveOutcome {
    pub fn is_degraded(&self) -> bool {
        self.status == Status::Degraded
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct AnswerOutcome {
    pub query: String,
    pub answer: Option<String>,
    pub passages: Vec<RetrievedPassage>,
    pub citations: Vec<Citation>,
    pub status: Status,
    pub error: Option<StageError>,
}

impl AnswerOutcome {
    fn degraded(query: String, passages: Vec<RetrievedPassage>, err: &MineRagError) -> Self {
        Self {
            query,
            answer: None,
            passages,
            citations: Vec::new(),
            status: Status::Degraded,
            error: Some(err.into()),
        }
    }

    pub fn is_degraded(&self) -> bool {
        self.status == Status::Degraded
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct HazardOutcome {
    pub summary: HazardSummary,
    pub detections: Vec<Detection>,
    pub rag_query: String,
    pub outcome: AnswerOutcome,
}

#[derive(Debug, Clone, Copy)]
pub struct Budgets {
    pub total: Duration,
    pub embed: Duration,
    pub generate: Duration,
}

impl Budgets {
    pub const fn from_config(config: &Config) -> Self {
        Self {
            total: Duration::from_secs(config.query.timeout_secs),
            embed: Duration::from_secs(config.embedding.timeout_secs),
            generate: Duration::from_secs(config.generation.timeout_secs),
        }
    }
}

pub struct QueryPipeline<E, G>
where
    E: EmbeddingGenerator + ?Sized,
    G: AnswerGenerator + ?Sized,
{
    embedder: Arc<E>,
    synthesizer: AnswerSynthesizer<G>,
    snapshots: Arc<SnapshotStore>,
    hazard: HazardBridge,
    budgets: Budgets,
    retrieval: RetrievalConfig,
}

impl<E, G> QueryPipeline<E, G>
where
    E: EmbeddingGenerator + ?Sized,
    G: AnswerGenerator + ?Sized,
{
    pub fn new(
        embedder: Arc<E>,
        generator: Arc<G>,
        snapshots: Arc<SnapshotStore>,
        config: &Config,
    ) -> Result<Self> {
        Ok(Self {
            embedder,
            synthesizer: AnswerSynthesizer::from_config(generator, &config.generation),
            snapshots,
            hazard: HazardBridge::from_config(&config.hazard)?,
            budgets: Budgets::from_config(config),
            retrieval: config.retrieval.clone(),
        })
    }

    #[must_use]
    pub const fn with_budgets(mut self, budgets: Budgets) -> Self {
        self.budgets = budgets;
        self
    }

    pub const fn snapshots(&self) -> &Arc<SnapshotStore> {
        &self.snapshots
    }

    pub fn embedder(&self) -> &E {
        &self.embedder
    }

    async fn retriever(&self) -> Result<Retriever<E>> {
        let index = self.snapshots.current().await?;
        index.metadata().check_compatible(self.embedder.as_ref())?;
        Ok(Retriever::new(Arc::clone(&self.embedder), index))
    }

    async fn timed_retrieve(
        &self,
        retriever: &Retriever<E>,
        query: &str,
        k: usize,
        deadline: Instant,
    ) -> Result<Vec<RetrievedPassage>> {
        let budget = self
            .budgets
            .embed
            .min(deadline.saturating_duration_since(Instant::now()));
        tokio::time::timeout(budget, retriever.answer_query(query, k))
            .await
            .unwrap_or_else(|_| {
                Err(MineRagError::EmbeddingFailure(format!(
                    "query embedding timed out after {}ms",
                    budget.as_millis()
                )))
            })
    }

    /// Retrieval only, no generation. A failed query embedding degrades to
    /// an empty result set.
    pub async fn retrieve(&self, query: &str, top_k: Option<usize>) -> Result<RetrieveOutcome> {
        let query = validate_query(query)?.to_string();
        let k = self.retrieval.resolve_top_k(top_k)?;
        let retriever = self.retriever().await?;
        let deadline = Instant::now() + self.budgets.total;

        match self.timed_retrieve(&retriever, &query, k, deadline).await {
            Ok(passages) => Ok(RetrieveOutcome {
                query,
                passages,
                status: Status::Ok,
                error: None,
            }),
            Err(err @ (MineRagError::EmbeddingFailure(_) | MineRagError::DimensionMismatch { .. })) => {
                warn!(error = %err, "retrieval degraded");
                Ok(RetrieveOutcome {
                    query,
                    passages: Vec::new(),
                    status: Status::Degraded,
                    error: Some((&err).into()),
                })
            }
            Err(err) => Err(err),
        }
    }

    /// Embed, retrieve, synthesize.
    pub async fn answer(&self, query: &str, top_k: Option<usize>) -> Result<AnswerOutcome> {
        let query = validate_query(query)?.to_string();
        let k = self.retrieval.resolve_top_k(top_k)?;
        let retriever = self.retriever().await?;
        let deadline = Instant::now() + self.budgets.total;

        let passages = match self.timed_retrieve(&retriever, &query, k, deadline).await {
            Ok(passages) => passages,
            Err(err @ (MineRagError::EmbeddingFailure(_) | MineRagError::DimensionMismatch { .. })) => {
                warn!(error = %err, "retrieval degraded");
                return Ok(AnswerOutcome::degraded(query, Vec::new(), &err));
            }
            Err(err) => return Err(err),
        };

        let budget = self
            .budgets
            .generate
            .min(deadline.saturating_duration_since(Instant::now()));
        match self.synthesizer.synthesize_within(&query, &passages, budget).await {
            Ok(answer) => Ok(AnswerOutcome {
                query,
                answer: Some(answer.text),
                passages,
                citations: answer.citations,
                status: Status::Ok,
                error: None,
            }),
            Err(err @ MineRagError::GenerationUnavailable(_)) => {
                warn!(error = %err, references = passages.len(), "generation degraded");
                Ok(AnswerOutcome::degraded(query, passages, &err))
            }
            Err(err) => Err(err),
        }
    }

    /// Summarize detections, turn them into a query and answer it.
    pub async fn hazard(
        &self,
        detections: Vec<Detection>,
        top_k: Option<usize>,
        min_confidence: Option<f32>,
    ) -> Result<HazardOutcome> {
        HazardBridge::validate(&detections)?;
        let bridge = self.hazard.with_override(min_confidence)?;
        let summary = bridge.summarize(&detections);
        let rag_query = HazardBridge::to_query(&summary);
        let outcome = self.answer(&rag_query, top_k).await?;
        Ok(HazardOutcome {
            summary,
            detections,
            rag_query,
            outcome,
        })
    }
}
