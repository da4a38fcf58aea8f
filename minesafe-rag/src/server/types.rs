use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::domain::{
    ChunkId, Citation, Detection, DocType, PpeClass, RetrievedPassage, RiskLevel,
};
use crate::services::{AnswerOutcome, HazardOutcome, RetrieveOutcome, StageError, Status};

#[derive(Debug, Clone, Deserialize)]
pub struct QueryRequest {
    pub query: String,
    #[serde(default)]
    pub top_k: Option<usize>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct HazardRequest {
    #[serde(default)]
    pub detections: Vec<Detection>,
    #[serde(default)]
    pub top_k: Option<usize>,
    /// Overrides the configured minimum detection confidence.
    #[serde(default)]
    pub conf: Option<f32>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Reference {
    pub rank: usize,
    pub chunk_id: ChunkId,
    pub text: String,
    pub source_path: String,
    pub page_number: u32,
    pub doc_type: DocType,
    pub score: f32,
}

impl From<&RetrievedPassage> for Reference {
    fn from(passage: &RetrievedPassage) -> Self {
        Self {
            rank: passage.rank,
            chunk_id: passage.chunk.id.clone(),
            text: passage.chunk.text.clone(),
            source_path: passage.chunk.source_path.clone(),
            page_number: passage.chunk.page_number,
            doc_type: passage.chunk.doc_type,
            score: passage.score,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub index_loaded: bool,
    pub chunks: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct RetrieveResponse {
    pub query: String,
    pub results: Vec<Reference>,
    pub status: Status,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<StageError>,
}

impl From<RetrieveOutcome> for RetrieveResponse {
    fn from(outcome: RetrieveOutcome) -> Self {
        Self {
            results: outcome.passages.iter().map(Reference::from).collect(),
            query: outcome.query,
            status: outcome.status,
            error: outcome.error,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct AnswerResponse {
    pub query: String,
    pub answer: Option<String>,
    pub references: Vec<Reference>,
    pub citations: Vec<Citation>,
    pub status: Status,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<StageError>,
}

impl From<AnswerOutcome> for AnswerResponse {
    fn from(outcome: AnswerOutcome) -> Self {
        Self {
            references: outcome.passages.iter().map(Reference::from).collect(),
            query: outcome.query,
            answer: outcome.answer,
            citations: outcome.citations,
            status: outcome.status,
            error: outcome.error,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct HazardResponse {
    pub hazard_summary: String,
    pub risk_level: RiskLevel,
    pub counts: BTreeMap<PpeClass, usize>,
    pub missing_ppe: Vec<String>,
    pub detections: Vec<Detection>,
    pub rag_query: String,
    pub answer: Option<String>,
    pub references: Vec<Reference>,
    pub citations: Vec<Citation>,
    pub status: Status,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<StageError>,
}

impl From<HazardOutcome> for HazardResponse {
    fn from(hazard: HazardOutcome) -> Self {
        let answer = AnswerResponse::from(hazard.outcome);
        Self {
            hazard_summary: hazard.summary.text,
            risk_level: hazard.summary.risk_level,
            counts: hazard.summary.counts,
            missing_ppe: hazard.summary.missing,
            detections: hazard.detections,
            rag_query: hazard.rag_query,
            answer: answer.answer,
            references: answer.references,
            citations: answer.citations,
            status: answer.status,
            error: answer.error,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ReloadResponse {
    pub status: &'static str,
    pub chunks: usize,
    pub embedder_model: String,
}

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub error: StageError,
}
