//! Grounded answer synthesis.
//!
//! Retrieved passages are numbered `[1]..[n]` in the prompt; the generator is
//! asked to cite them by number. Markers pointing outside that range are
//! removed before the answer leaves this module, so every citation resolves
//! to a passage the caller holds.

use std::fmt::Write as _;
use std::sync::{Arc, LazyLock};
use std::time::Duration;

use regex::Regex;
use tracing::{debug, warn};

use crate::config::GenerationConfig;
use crate::domain::{Citation, RetrievedPassage, SynthesizedAnswer};
use crate::error::{MineRagError, Result};
use crate::ports::{AnswerGenerator, GenerationRequest};

pub const NO_PASSAGES_ANSWER: &str = "No relevant passages were found in the indexed documents.";

pub const SYSTEM_PROMPT: &str = "You are a mining work health and safety assistant for Australian operations. \
Use ONLY the provided context, which comes from safety regulators, equipment manuals and incident reports. \
Do not invent laws or controls. If something is not in the context, say you cannot answer from the given documents.\n\n\
Respond as a short checklist:\n\
- Use 3-7 bullet points.\n\
- Each bullet must be a clear, actionable step.\n\
- Use simple, practical language for frontline workers and supervisors.\n\
- Indicate when work should be stopped and the issue escalated to a supervisor or safety team.\n\n\
Do not give legal advice. Stay within the provided WHS context.";

const CONTEXT_SEPARATOR: &str = "\n\n---\n\n";

static MARKER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\[\s*([0-9]+(?:\s*,\s*[0-9]+)*)\s*\]").expect("valid citation regex")
});

pub struct AnswerSynthesizer<G>
where
    G: AnswerGenerator + ?Sized,
{
    generator: Arc<G>,
    timeout: Duration,
    require_citations: bool,
}

impl<G> AnswerSynthesizer<G>
where
    G: AnswerGenerator + ?Sized,
{
    pub const fn new(generator: Arc<G>) -> Self {
        Self {
            generator,
            timeout: Duration::from_secs(60),
            require_citations: true,
        }
    }

    pub fn from_config(generator: Arc<G>, config: &GenerationConfig) -> Self {
        Self {
            generator,
            timeout: Duration::from_secs(config.timeout_secs),
            require_citations: config.require_citations,
        }
    }

    #[must_use]
    pub const fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    #[must_use]
    pub const fn require_citations(mut self, required: bool) -> Self {
        self.require_citations = required;
        self
    }

    pub const fn timeout(&self) -> Duration {
        self.timeout
    }

    pub async fn synthesize(
        &self,
        query: &str,
        passages: &[RetrievedPassage],
    ) -> Result<SynthesizedAnswer> {
        self.synthesize_within(query, passages, self.timeout).await
    }

    /// Like [`Self::synthesize`], with the generator call bounded by
    /// `budget` instead of the configured timeout.
    pub async fn synthesize_within(
        &self,
        query: &str,
        passages: &[RetrievedPassage],
        budget: Duration,
    ) -> Result<SynthesizedAnswer> {
        if passages.is_empty() {
            return Ok(SynthesizedAnswer {
                text: NO_PASSAGES_ANSWER.to_string(),
                citations: Vec::new(),
            });
        }

        let user_prompt = build_user_prompt(query, passages);
        let request = GenerationRequest {
            system_prompt: SYSTEM_PROMPT,
            user_prompt: &user_prompt,
            query,
            passages,
        };

        let raw = tokio::time::timeout(budget, self.generator.generate(&request))
            .await
            .map_err(|_| {
                MineRagError::GenerationUnavailable(format!(
                    "{} timed out after {}ms",
                    self.generator.model_name(),
                    budget.as_millis()
                ))
            })?
            .map_err(MineRagError::into_generation_unavailable)?;

        if raw.trim().is_empty() {
            return Err(MineRagError::GenerationUnavailable(format!(
                "{} returned an empty answer",
                self.generator.model_name()
            )));
        }

        let answer = resolve_citations(raw.trim(), passages);
        if self.require_citations && answer.citations.is_empty() {
            return Err(MineRagError::GenerationUnavailable(
                "answer cites none of the retrieved passages".to_string(),
            ));
        }
        debug!(citations = answer.citations.len(), "synthesized answer");
        Ok(answer)
    }
}

pub fn build_user_prompt(query: &str, passages: &[RetrievedPassage]) -> String {
    let context = passages
        .iter()
        .enumerate()
        .map(|(i, p)| {
            format!(
                "[{}] {} | {} | page {}\n{}",
                i + 1,
                p.chunk.doc_type,
                p.chunk.file_name(),
                p.chunk.page_number,
                p.chunk.text
            )
        })
        .collect::<Vec<_>>()
        .join(CONTEXT_SEPARATOR);

    format!(
        "Question:\n{query}\n\n\
         Context from manuals, incident reports and safety bulletins:\n{context}\n\n\
         Using only this context, answer as a short checklist. \
         Provide 3-7 bullet points with clear, actionable steps. \
         Where relevant, mention when to stop work and escalate. \
         When you refer to specific context, use the source numbers in square brackets like [1], [2], etc."
    )
}

/// Removes anything shaped like a citation marker, with the blanks before it.
/// Quoted source text goes through this so bracketed numbers it happens to
/// contain are never read as citations of another passage.
pub fn strip_markers(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut last = 0usize;
    for marker in MARKER.find_iter(text) {
        out.push_str(&text[last..marker.start()]);
        let kept = out.trim_end_matches([' ', '\t']).len();
        out.truncate(kept);
        last = marker.end();
    }
    out.push_str(&text[last..]);
    out
}

/// Rewrites citation markers so they only name passages in `1..=passages.len()`
/// and collects one citation per surviving index.
pub fn resolve_citations(raw: &str, passages: &[RetrievedPassage]) -> SynthesizedAnswer {
    let mut text = String::with_capacity(raw.len());
    // (passage index, marker start, marker end) in `text` coordinates.
    let mut found: Vec<(usize, usize, usize)> = Vec::new();
    let mut stripped = 0usize;
    let mut last = 0usize;

    for caps in MARKER.captures_iter(raw) {
        let Some(whole) = caps.get(0) else { continue };
        text.push_str(&raw[last..whole.start()]);
        last = whole.end();

        let mut valid: Vec<usize> = Vec::new();
        for part in caps[1].split(',') {
            match part.trim().parse::<usize>() {
                Ok(n) if (1..=passages.len()).contains(&n) => {
                    if !valid.contains(&n) {
                        valid.push(n);
                    }
                }
                _ => stripped += 1,
            }
        }

        if valid.is_empty() {
            let kept = text.trim_end_matches([' ', '\t']).len();
            text.truncate(kept);
            continue;
        }

        let start = text.len();
        text.push('[');
        for (i, n) in valid.iter().enumerate() {
            if i > 0 {
                text.push_str(", ");
            }
            let _ = write!(text, "{n}");
        }
        text.push(']');
        let end = text.len();
        found.extend(valid.into_iter().map(|n| (n, start, end)));
    }
    text.push_str(&raw[last..]);

    if stripped > 0 {
        warn!(
            stripped,
            passages = passages.len(),
            "removed citation markers outside the retrieved set"
        );
    }

    let citations = found
        .into_iter()
        .map(|(n, start, end)| {
            let line_start = text[..start].rfind('\n').map_or(0, |i| i + 1);
            Citation::for_passage(n, &passages[n - 1], (line_start, end))
        })
        .collect();

    SynthesizedAnswer { text, citations }
}
