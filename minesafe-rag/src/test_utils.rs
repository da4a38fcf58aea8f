//! Stub collaborators shared by unit tests.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;

use crate::domain::{Chunk, ChunkId, ChunkSpan, DocType};
use crate::error::{MineRagError, Result};
use crate::ports::{AnswerGenerator, EmbeddingGenerator, GenerationRequest};

/// Returns a fixed vector per known text and `fallback` for anything else.
pub struct StubEmbedder {
    pub vectors: HashMap<String, Vec<f32>>,
    pub fallback: Vec<f32>,
    pub calls: AtomicUsize,
}

impl StubEmbedder {
    pub fn constant(vector: Vec<f32>) -> Self {
        Self {
            vectors: HashMap::new(),
            fallback: vector,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn with(mut self, text: &str, vector: Vec<f32>) -> Self {
        self.vectors.insert(text.to_string(), vector);
        self
    }
}

#[async_trait]
impl EmbeddingGenerator for StubEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self
            .vectors
            .get(text)
            .cloned()
            .unwrap_or_else(|| self.fallback.clone()))
    }

    async fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
        let mut out = Vec::with_capacity(texts.len());
        for text in texts {
            out.push(self.embed(text).await?);
        }
        Ok(out)
    }

    fn dimension(&self) -> usize {
        self.fallback.len()
    }

    fn model_name(&self) -> &str {
        "stub"
    }
}

/// Fails every call after the first `succeed_batches` batches.
pub struct FailingEmbedder {
    pub dimension: usize,
    pub succeed_batches: usize,
    pub batches: AtomicUsize,
}

impl FailingEmbedder {
    pub const fn new(dimension: usize, succeed_batches: usize) -> Self {
        Self {
            dimension,
            succeed_batches,
            batches: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl EmbeddingGenerator for FailingEmbedder {
    async fn embed(&self, _text: &str) -> Result<Vec<f32>> {
        Err(MineRagError::EmbeddingFailure("model offline".to_string()))
    }

    async fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
        if self.batches.fetch_add(1, Ordering::SeqCst) < self.succeed_batches {
            return Ok(texts.iter().map(|_| vec![1.0; self.dimension]).collect());
        }
        Err(MineRagError::EmbeddingFailure("model offline".to_string()))
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    fn model_name(&self) -> &str {
        "failing"
    }
}

/// Sleeps before answering, for timeout tests.
pub struct SlowEmbedder {
    pub delay: Duration,
    pub dimension: usize,
}

#[async_trait]
impl EmbeddingGenerator for SlowEmbedder {
    async fn embed(&self, _text: &str) -> Result<Vec<f32>> {
        tokio::time::sleep(self.delay).await;
        Ok(vec![1.0; self.dimension])
    }

    async fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
        tokio::time::sleep(self.delay).await;
        Ok(texts.iter().map(|_| vec![1.0; self.dimension]).collect())
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    fn model_name(&self) -> &str {
        "slow"
    }
}

/// Replies with canned text, or an error when `reply` is `None`.
pub struct StubGenerator {
    pub reply: Option<String>,
    pub delay: Option<Duration>,
    pub last_prompt: std::sync::Mutex<Option<String>>,
}

impl StubGenerator {
    pub fn replying(reply: impl Into<String>) -> Self {
        Self {
            reply: Some(reply.into()),
            delay: None,
            last_prompt: std::sync::Mutex::new(None),
        }
    }

    pub fn failing() -> Self {
        Self {
            reply: None,
            delay: None,
            last_prompt: std::sync::Mutex::new(None),
        }
    }

    #[must_use]
    pub const fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn last_prompt(&self) -> Option<String> {
        self.last_prompt.lock().unwrap().clone()
    }
}

#[async_trait]
impl AnswerGenerator for StubGenerator {
    async fn generate(&self, request: &GenerationRequest<'_>) -> Result<String> {
        *self.last_prompt.lock().unwrap() = Some(request.user_prompt.to_string());
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        self.reply
            .clone()
            .ok_or_else(|| MineRagError::GenerationUnavailable("upstream 503".to_string()))
    }

    fn model_name(&self) -> &str {
        "stub-generator"
    }
}

pub fn chunk(source_path: &str, page: u32, index: usize, text: &str) -> Chunk {
    Chunk {
        id: ChunkId::derive(source_path, page, index),
        text: text.to_string(),
        source_path: source_path.to_string(),
        page_number: page,
        doc_type: DocType::Manual,
        ordinal: index,
        span: ChunkSpan {
            start: 0,
            end: text.len(),
        },
        prev: None,
        next: None,
    }
}
