//! Document chunking.
//!
//! Splits extracted text into windows of roughly `chunk_size` characters,
//! with `overlap` characters shared between consecutive windows. A window
//! prefers to end at a paragraph boundary, then a sentence boundary, found
//! within `boundary_tolerance` characters before the hard limit; otherwise it
//! ends exactly at the limit.
//!
//! Offsets are character (not byte) offsets. Chunk text is a verbatim slice
//! of the source, whitespace included, so the chunks of one document rebuild
//! its text when each chunk contributes only what lies past the previous
//! chunk's end. Overlap is informational and never deduplicated.

use docqa_core::ChunkingConfig;
use serde::{Deserialize, Serialize};
use unicode_segmentation::UnicodeSegmentation;

/// A contiguous span of one document's text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Chunk {
    /// Ordinal id, unique across one ingestion run
    pub id: u64,

    /// Source document identifier
    pub source: String,

    /// Character offset of the first character (inclusive)
    pub char_start: usize,

    /// Character offset past the last character (exclusive)
    pub char_end: usize,

    pub text: String,
}

/// A span produced by the splitter, before ids are assigned.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextSpan {
    pub start: usize,
    pub end: usize,
    pub text: String,
}

/// Deterministic text chunker.
#[derive(Debug, Clone)]
pub struct Chunker {
    config: ChunkingConfig,
}

impl Chunker {
    pub fn new(config: ChunkingConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ChunkingConfig {
        &self.config
    }

    /// Chunk one document, numbering chunks from `first_id`.
    pub fn chunk(&self, source: &str, text: &str, first_id: u64) -> Vec<Chunk> {
        split_text(text, &self.config)
            .into_iter()
            .zip(first_id..)
            .map(|(span, id)| Chunk {
                id,
                source: source.to_string(),
                char_start: span.start,
                char_end: span.end,
                text: span.text,
            })
            .collect()
    }
}

/// Split `text` into spans. Empty input yields no spans.
pub fn split_text(text: &str, config: &ChunkingConfig) -> Vec<TextSpan> {
    let chars: Vec<char> = text.chars().collect();
    let total = chars.len();
    if total == 0 {
        return Vec::new();
    }

    let size = config.chunk_size.max(1);
    let overlap = config.overlap.min(size - 1);
    let paragraphs = paragraph_boundaries(&chars);
    let sentences = sentence_boundaries(text);

    let mut spans = Vec::new();
    let mut start = 0;
    loop {
        let hard_end = (start + size).min(total);
        let end = if hard_end == total {
            total
        } else {
            let floor = hard_end.saturating_sub(config.boundary_tolerance).max(start + 1);
            last_boundary_in(&paragraphs, floor, hard_end)
                .or_else(|| last_boundary_in(&sentences, floor, hard_end))
                .unwrap_or(hard_end)
        };

        spans.push(TextSpan {
            start,
            end,
            text: chars[start..end].iter().collect(),
        });

        if end == total {
            break;
        }

        // Overlap must not stall the window
        start = match end.checked_sub(overlap) {
            Some(next) if next > start => next,
            _ => end,
        };
    }

    spans
}

/// Largest boundary `b` with `floor <= b <= ceiling`.
fn last_boundary_in(boundaries: &[usize], floor: usize, ceiling: usize) -> Option<usize> {
    let idx = boundaries.partition_point(|&b| b <= ceiling);
    let candidate = *boundaries.get(idx.checked_sub(1)?)?;
    (candidate >= floor).then_some(candidate)
}

/// Starts of paragraphs that follow a blank line.
fn paragraph_boundaries(chars: &[char]) -> Vec<usize> {
    let mut boundaries = Vec::new();
    let mut newlines = 0;
    for (i, c) in chars.iter().enumerate() {
        if *c == '\n' {
            newlines += 1;
        } else if !c.is_whitespace() {
            if newlines >= 2 {
                boundaries.push(i);
            }
            newlines = 0;
        }
    }
    boundaries
}

/// Character offsets where a sentence (with its trailing whitespace) ends.
fn sentence_boundaries(text: &str) -> Vec<usize> {
    let mut boundaries = Vec::new();
    let mut offset = 0;
    for sentence in text.split_sentence_bounds() {
        offset += sentence.chars().count();
        boundaries.push(offset);
    }
    boundaries
}
