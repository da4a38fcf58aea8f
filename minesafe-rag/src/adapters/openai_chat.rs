use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::warn;

use super::openai::{build_client, is_retryable_error, may_retry, retry_backoff, should_retry};
use crate::error::{MineRagError, Result};
use crate::ports::{AnswerGenerator, GenerationRequest};

/// Chat-completions answer generator.
pub struct OpenAiGenerator {
    client: Client,
    endpoint: String,
    model: String,
    temperature: f32,
    max_tokens: usize,
    max_retries: usize,
}

impl OpenAiGenerator {
    pub fn new(
        api_key: &str,
        base_url: &str,
        model: impl Into<String>,
        temperature: f32,
        max_tokens: usize,
        timeout: Duration,
        max_retries: usize,
    ) -> Result<Self> {
        Ok(Self {
            client: build_client(api_key, timeout)?,
            endpoint: format!("{}/chat/completions", base_url.trim_end_matches('/')),
            model: model.into(),
            temperature,
            max_tokens,
            max_retries,
        })
    }
}

#[async_trait]
impl AnswerGenerator for OpenAiGenerator {
    async fn generate(&self, request: &GenerationRequest<'_>) -> Result<String> {
        let body = ChatRequest {
            model: &self.model,
            temperature: self.temperature,
            max_tokens: self.max_tokens,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: request.system_prompt,
                },
                ChatMessage {
                    role: "user",
                    content: request.user_prompt,
                },
            ],
        };

        let mut attempt = 0usize;
        loop {
            match self.client.post(&self.endpoint).json(&body).send().await {
                Ok(resp) => {
                    let status = resp.status();
                    if status.is_success() {
                        let parsed: ChatResponse = resp.json().await?;
                        return Ok(first_content(parsed));
                    }
                    let text = resp
                        .text()
                        .await
                        .unwrap_or_else(|_| "<body unavailable>".to_string());
                    if should_retry(status) && may_retry(attempt, self.max_retries) {
                        attempt += 1;
                        warn!(%status, attempt, "retrying chat completion");
                        tokio::time::sleep(retry_backoff(attempt)).await;
                        continue;
                    }
                    return Err(MineRagError::GenerationUnavailable(format!(
                        "OpenAI returned {status}: {text}"
                    )));
                }
                Err(err) => {
                    if is_retryable_error(&err) && may_retry(attempt, self.max_retries) {
                        attempt += 1;
                        tokio::time::sleep(retry_backoff(attempt)).await;
                        continue;
                    }
                    return Err(MineRagError::GenerationUnavailable(err.to_string()));
                }
            }
        }
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}

fn first_content(parsed: ChatResponse) -> String {
    parsed
        .choices
        .into_iter()
        .find_map(|choice| choice.message.content)
        .unwrap_or_default()
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    temperature: f32,
    max_tokens: usize,
    messages: Vec<ChatMessage<'a>>,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: AssistantMessage,
}

#[derive(Debug, Deserialize)]
struct AssistantMessage {
    content: Option<String>,
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use axum::Router;
    use axum::http::StatusCode;
    use axum::routing::post;

    use super::*;

    /// Serves `/chat/completions` with a 503 every time, counting hits.
    async fn unavailable_upstream(hits: Arc<AtomicUsize>) -> String {
        let app = Router::new().route(
            "/chat/completions",
            post(move || {
                let hits = Arc::clone(&hits);
                async move {
                    hits.fetch_add(1, Ordering::SeqCst);
                    StatusCode::SERVICE_UNAVAILABLE
                }
            }),
        );
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move { axum::serve(listener, app).await.unwrap() });
        format!("http://{addr}")
    }

    async fn requests_made(max_retries: usize) -> usize {
        let hits = Arc::new(AtomicUsize::new(0));
        let base_url = unavailable_upstream(Arc::clone(&hits)).await;
        let generator = OpenAiGenerator::new(
            "test-key",
            &base_url,
            "gpt-4.1",
            0.2,
            100,
            Duration::from_secs(5),
            max_retries,
        )
        .unwrap();
        let request = GenerationRequest {
            system_prompt: "system",
            user_prompt: "user",
            query: "helmets",
            passages: &[],
        };

        let result = generator.generate(&request).await;
        assert!(matches!(result, Err(MineRagError::GenerationUnavailable(_))));
        hits.load(Ordering::SeqCst)
    }

    #[tokio::test]
    async fn test_max_retries_counts_retries_not_attempts() {
        assert_eq!(requests_made(0).await, 1);
        assert_eq!(requests_made(1).await, 2);
    }

    #[test]
    fn test_first_content_skips_null_messages() {
        let parsed: ChatResponse = serde_json::from_str(
            r#"{"choices": [
                {"message": {"content": null}},
                {"message": {"content": "- Wear a helmet [1]"}}
            ]}"#,
        )
        .unwrap();
        assert_eq!(first_content(parsed), "- Wear a helmet [1]");
    }

    #[test]
    fn test_no_choices_is_empty() {
        let parsed: ChatResponse = serde_json::from_str(r#"{"choices": []}"#).unwrap();
        assert!(first_content(parsed).is_empty());
    }
}
