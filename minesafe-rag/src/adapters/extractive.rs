use async_trait::async_trait;

use crate::error::Result;
use crate::ports::{AnswerGenerator, GenerationRequest};
use crate::services::synthesis::strip_markers;

const MAX_BULLETS: usize = 7;
const MAX_BULLET_CHARS: usize = 240;

/// Offline generator that quotes the lead sentence of each passage.
///
/// Every bullet carries the marker of the passage it came from, so output is
/// always fully cited.
#[derive(Debug, Clone, Copy, Default)]
pub struct ExtractiveGenerator;

impl ExtractiveGenerator {
    pub const fn new() -> Self {
        Self
    }
}

#[async_trait]
impl AnswerGenerator for ExtractiveGenerator {
    async fn generate(&self, request: &GenerationRequest<'_>) -> Result<String> {
        let bullets: Vec<String> = request
            .passages
            .iter()
            .take(MAX_BULLETS)
            .enumerate()
            .filter_map(|(i, passage)| {
                lead_sentence(&passage.chunk.text).map(|s| format!("- {s} [{}]", i + 1))
            })
            .collect();
        Ok(bullets.join("\n"))
    }

    fn model_name(&self) -> &str {
        "extractive"
    }
}

fn lead_sentence(text: &str) -> Option<String> {
    let collapsed = strip_markers(text)
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ");
    if collapsed.is_empty() {
        return None;
    }
    let sentence = collapsed
        .find(". ")
        .map_or(collapsed.as_str(), |end| &collapsed[..=end]);
    if sentence.chars().count() <= MAX_BULLET_CHARS {
        return Some(sentence.to_string());
    }
    let cut: String = sentence.chars().take(MAX_BULLET_CHARS).collect();
    Some(format!("{}...", cut.trim_end()))
}
