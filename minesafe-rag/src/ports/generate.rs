use async_trait::async_trait;

use crate::domain::RetrievedPassage;
use crate::error::Result;

/// Everything a generation model gets for one answer.
#[derive(Debug, Clone, Copy)]
pub struct GenerationRequest<'a> {
    pub system_prompt: &'a str,
    pub user_prompt: &'a str,
    pub query: &'a str,
    pub passages: &'a [RetrievedPassage],
}

#[async_trait]
pub trait AnswerGenerator: Send + Sync {
    async fn generate(&self, request: &GenerationRequest<'_>) -> Result<String>;
    fn model_name(&self) -> &str;
}
