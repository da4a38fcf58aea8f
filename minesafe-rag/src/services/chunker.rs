//! Page-level text chunking.
//!
//! Windows of at most `chunk_size` characters are cut at the strongest
//! separator in the second half of the window (paragraph, line, sentence,
//! word) and consecutive windows overlap by `chunk_overlap` characters.

use tracing::debug;

use crate::config::ChunkingConfig;
use crate::domain::{Chunk, ChunkId, ChunkSpan, Document};
use crate::error::{MineRagError, Result};

const SEPARATORS: [&str; 4] = ["\n\n", "\n", ". ", " "];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Chunker {
    chunk_size: usize,
    chunk_overlap: usize,
}

impl Chunker {
    pub fn new(chunk_size: usize, chunk_overlap: usize) -> Result<Self> {
        if chunk_size == 0 {
            return Err(MineRagError::Config(
                "chunk_size must be at least 1".to_string(),
            ));
        }
        if chunk_overlap >= chunk_size {
            return Err(MineRagError::Config(format!(
                "chunk_overlap ({chunk_overlap}) must be smaller than chunk_size ({chunk_size})"
            )));
        }
        Ok(Self {
            chunk_size,
            chunk_overlap,
        })
    }

    pub fn from_config(config: &ChunkingConfig) -> Result<Self> {
        Self::new(config.chunk_size, config.chunk_overlap)
    }

    pub const fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    pub const fn chunk_overlap(&self) -> usize {
        self.chunk_overlap
    }

    /// Splits every page of `document` into chunks. Pages without text yield
    /// nothing; ordinals increase across the whole document. Windows holding
    /// only whitespace are folded into a neighbour, so chunks still cover
    /// the page and may exceed `chunk_size` by that whitespace alone.
    pub fn chunk(&self, document: &Document) -> Vec<Chunk> {
        let mut chunks: Vec<Chunk> = Vec::new();

        for page in document.pages() {
            if page.text.trim().is_empty() {
                continue;
            }

            let first = chunks.len();
            let spans = absorb_blank_spans(&page.text, self.split(&page.text));

            for (index, span) in spans.into_iter().enumerate() {
                let ordinal = chunks.len();
                chunks.push(Chunk {
                    id: ChunkId::derive(document.source_path(), page.number, index),
                    text: page.text[span.start..span.end].to_string(),
                    source_path: document.source_path().to_string(),
                    page_number: page.number,
                    doc_type: document.doc_type(),
                    ordinal,
                    span,
                    prev: None,
                    next: None,
                });
            }

            link_neighbours(&mut chunks[first..]);
        }

        debug!(
            source = document.source_path(),
            pages = document.pages().len(),
            chunks = chunks.len(),
            "chunked document"
        );
        chunks
    }

    pub fn chunk_all(&self, documents: &[Document]) -> Vec<Chunk> {
        documents.iter().flat_map(|doc| self.chunk(doc)).collect()
    }

    fn split(&self, text: &str) -> Vec<ChunkSpan> {
        // boundaries[i] is the byte offset of character i; the final entry is text.len().
        let boundaries: Vec<usize> = text
            .char_indices()
            .map(|(i, _)| i)
            .chain(std::iter::once(text.len()))
            .collect();
        let total = boundaries.len() - 1;

        let mut spans = Vec::new();
        let mut start = 0;
        loop {
            let hard_end = (start + self.chunk_size).min(total);
            if hard_end == total {
                spans.push(ChunkSpan {
                    start: boundaries[start],
                    end: text.len(),
                });
                break;
            }

            let end = Self::find_break(text, &boundaries, start, hard_end);
            spans.push(ChunkSpan {
                start: boundaries[start],
                end: boundaries[end],
            });

            let next = end.saturating_sub(self.chunk_overlap);
            start = if next > start { next } else { end };
        }
        spans
    }

    /// Character index to cut at, in `(start + len / 2, hard_end]`.
    fn find_break(text: &str, boundaries: &[usize], start: usize, hard_end: usize) -> usize {
        let min_end = start + (hard_end - start) / 2;
        let window_start = boundaries[min_end];
        let window = &text[window_start..boundaries[hard_end]];

        for separator in SEPARATORS {
            if let Some(pos) = window.rfind(separator) {
                let cut_byte = window_start + pos + separator.len();
                let cut = boundaries.partition_point(|&b| b < cut_byte);
                if cut > start {
                    return cut;
                }
            }
        }
        hard_end
    }
}

/// Merges whitespace-only spans into the preceding kept span, or into the
/// following one when the page starts with blank windows.
fn absorb_blank_spans(text: &str, spans: Vec<ChunkSpan>) -> Vec<ChunkSpan> {
    let mut kept: Vec<ChunkSpan> = Vec::with_capacity(spans.len());
    let mut pending_start: Option<usize> = None;

    for mut span in spans {
        if text[span.start..span.end].trim().is_empty() {
            match kept.last_mut() {
                Some(last) => last.end = last.end.max(span.end),
                None => {
                    pending_start.get_or_insert(span.start);
                }
            }
            continue;
        }
        if let Some(start) = pending_start.take() {
            span.start = span.start.min(start);
        }
        kept.push(span);
    }
    kept
}

fn link_neighbours(page_chunks: &mut [Chunk]) {
    let ids: Vec<ChunkId> = page_chunks.iter().map(|c| c.id.clone()).collect();
    for (i, chunk) in page_chunks.iter_mut().enumerate() {
        chunk.prev = i.checked_sub(1).map(|p| ids[p].clone());
        chunk.next = ids.get(i + 1).cloned();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::DocType;
    use pretty_assertions::assert_eq;

    fn manual(pages: &[&str]) -> Document {
        Document::new("data/raw/manuals/haul-road.pdf", DocType::Manual, pages.iter().copied())
            .unwrap()
    }

    fn long_page() -> String {
        (1..=40)
            .map(|i| format!("Step {i} requires the operator to isolate energy sources before work."))
            .collect::<Vec<_>>()
            .join(" ")
    }

    #[test]
    fn test_short_page_is_single_chunk() {
        let text = "Wear a helmet at all times near mobile plant.";
        let chunks = Chunker::new(800, 200).unwrap().chunk(&manual(&[text]));

        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].text, text);
        assert_eq!(chunks[0].page_number, 1);
        assert_eq!(chunks[0].prev, None);
        assert_eq!(chunks[0].next, None);
    }

    #[test]
    fn test_empty_pages_yield_nothing_but_do_not_stop_chunking() {
        let chunks = Chunker::new(100, 20)
            .unwrap()
            .chunk(&manual(&["", "   \n ", "Check tyre pressure daily."]));

        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].page_number, 3);
    }

    #[test]
    fn test_chunks_are_bounded_substrings_of_their_page() {
        let page = long_page();
        let chunker = Chunker::new(200, 50).unwrap();
        let chunks = chunker.chunk(&manual(&[page.as_str()]));

        assert!(chunks.len() > 1);
        for chunk in &chunks {
            assert!(chunk.text.chars().count() <= 200);
            assert_eq!(&page[chunk.span.start..chunk.span.end], chunk.text);
        }
    }

    #[test]
    fn test_spans_cover_the_page() {
        let page = long_page();
        let chunks = Chunker::new(180, 40).unwrap().chunk(&manual(&[page.as_str()]));

        assert_eq!(chunks.first().unwrap().span.start, 0);
        assert_eq!(chunks.last().unwrap().span.end, page.len());
        for pair in chunks.windows(2) {
            assert!(pair[1].span.start <= pair[0].span.end);
            assert!(pair[1].span.start > pair[0].span.start);
        }

        let total: usize = chunks.iter().map(|c| c.text.len()).sum();
        assert!(total >= page.len());
    }

    #[test]
    fn test_whitespace_runs_stay_covered() {
        let page = format!("A{}B", " ".repeat(2000));
        let chunks = Chunker::new(800, 200).unwrap().chunk(&manual(&[page.as_str()]));

        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[0].span.start, 0);
        assert_eq!(chunks[1].span.end, page.len());
        assert!(chunks[1].span.start <= chunks[0].span.end);
        for chunk in &chunks {
            assert_eq!(chunk.text, &page[chunk.span.start..chunk.span.end]);
        }
        let total: usize = chunks.iter().map(|c| c.text.len()).sum();
        assert!(total >= page.len(), "{total} < {}", page.len());
    }

    #[test]
    fn test_leading_whitespace_joins_the_first_chunk() {
        let page = format!("{}Wear a hard hat.", " ".repeat(2000));
        let chunks = Chunker::new(800, 200).unwrap().chunk(&manual(&[page.as_str()]));

        assert_eq!(chunks.first().unwrap().span.start, 0);
        assert_eq!(chunks.last().unwrap().span.end, page.len());
        assert!(chunks.iter().all(|c| !c.text.trim().is_empty()));
    }

    #[test]
    fn test_overlap_is_bounded_by_configuration() {
        let page = long_page();
        let chunks = Chunker::new(150, 30).unwrap().chunk(&manual(&[page.as_str()]));

        for pair in chunks.windows(2) {
            let shared = pair[0].span.end.saturating_sub(pair[1].span.start);
            assert!(shared <= 30, "overlap of {shared} bytes");
        }
    }

    #[test]
    fn test_prefers_sentence_boundaries() {
        let page = long_page();
        let chunks = Chunker::new(200, 0).unwrap().chunk(&manual(&[page.as_str()]));

        for chunk in &chunks[..chunks.len() - 1] {
            assert!(chunk.text.ends_with(". "), "cut mid-sentence: {:?}", chunk.text);
        }
    }

    #[test]
    fn test_ordinals_and_links() {
        let page = long_page();
        let chunks = Chunker::new(200, 50)
            .unwrap()
            .chunk(&manual(&[page.as_str(), "Second page text."]));

        for (i, chunk) in chunks.iter().enumerate() {
            assert_eq!(chunk.ordinal, i);
        }
        let first_page: Vec<&Chunk> = chunks.iter().filter(|c| c.page_number == 1).collect();
        assert_eq!(first_page[0].next.as_ref(), Some(&first_page[1].id));
        assert_eq!(first_page[1].prev.as_ref(), Some(&first_page[0].id));

        let last = chunks.last().unwrap();
        assert_eq!(last.page_number, 2);
        assert_eq!(last.prev, None);
    }

    #[test]
    fn test_chunking_is_deterministic() {
        let page = long_page();
        let doc = manual(&[page.as_str()]);
        let chunker = Chunker::new(220, 60).unwrap();

        assert_eq!(chunker.chunk(&doc), chunker.chunk(&doc));
    }

    #[test]
    fn test_multibyte_text_is_split_on_char_boundaries() {
        let page = "Überprüfung der Bremsanlage – täglich durchführen. ".repeat(20);
        let chunks = Chunker::new(64, 16).unwrap().chunk(&manual(&[page.as_str()]));

        assert!(chunks.len() > 1);
        for chunk in &chunks {
            assert!(chunk.text.chars().count() <= 64);
        }
    }

    #[test]
    fn test_text_without_separators_is_cut_hard() {
        let page = "x".repeat(250);
        let chunks = Chunker::new(100, 10).unwrap().chunk(&manual(&[page.as_str()]));

        let lens: Vec<usize> = chunks.iter().map(|c| c.text.len()).collect();
        assert_eq!(lens, vec![100, 100, 70]);
    }

    #[test]
    fn test_rejects_invalid_parameters() {
        assert!(Chunker::new(0, 0).is_err());
        assert!(Chunker::new(100, 100).is_err());
        assert!(Chunker::new(100, 99).is_ok());
    }
}
