//! Character-budget chunking with sliding overlap.
//!
//! Boundaries come from `semchunk-rs`, which prefers paragraph, line, sentence, and word breaks
//! before cutting inside a word. The budget is measured in characters. Base chunks are cut to
//! `chunk_size - overlap - 1` characters, then each is prefixed with the word-aligned tail of its
//! predecessor (at most `overlap` characters) and a joining space, so the result never exceeds
//! `chunk_size`. Chunks never cross page boundaries.

use crate::pdf::PageText;
use semchunk_rs::Chunker;

use super::types::ChunkingError;

/// A span of extracted text, the unit of retrieval.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextChunk {
    /// Chunk contents.
    pub text: String,
    /// 1-based page the chunk was cut from.
    pub page: u32,
    /// Position of the chunk within the document.
    pub position: usize,
}

/// Split every page into overlapping chunks of at most `chunk_size` characters.
///
/// Whitespace-only pages contribute nothing. Positions run across the whole document.
pub fn chunk_pages(
    pages: &[PageText],
    chunk_size: usize,
    overlap: usize,
) -> Result<Vec<TextChunk>, ChunkingError> {
    let mut chunks = Vec::new();
    for page in pages {
        for text in chunk_text(&page.text, chunk_size, overlap)? {
            chunks.push(TextChunk {
                text,
                page: page.number,
                position: chunks.len(),
            });
        }
    }
    Ok(chunks)
}

/// Chunk a single text. Returns an empty vector when the input is all whitespace.
pub fn chunk_text(
    text: &str,
    chunk_size: usize,
    overlap: usize,
) -> Result<Vec<String>, ChunkingError> {
    if chunk_size == 0 {
        return Err(ChunkingError::InvalidChunkSize);
    }
    if text.trim().is_empty() {
        return Ok(Vec::new());
    }

    // Overlap may take at most half of the budget so every chunk still carries new text.
    let overlap = overlap.min(chunk_size.saturating_sub(1) / 2);
    let base_budget = if overlap == 0 {
        chunk_size
    } else {
        chunk_size - overlap - 1
    };
    Ok(apply_overlap(base_chunks(text, base_budget), overlap))
}

fn char_count(text: &str) -> usize {
    text.chars().count()
}

/// Semantic split at `budget`, hard-capped because semchunk's rejoined separators can overshoot.
/// Blank pieces are dropped.
fn base_chunks(text: &str, budget: usize) -> Vec<String> {
    let chunker = Chunker::new(budget, Box::new(|segment: &str| char_count(segment)));
    chunker
        .chunk(text)
        .iter()
        .flat_map(|chunk| cap_chunk(chunk, budget))
        .collect()
}

/// Cut `chunk` into trimmed pieces of at most `budget` characters, breaking on whitespace when
/// possible.
fn cap_chunk(chunk: &str, budget: usize) -> Vec<String> {
    let mut pieces = Vec::new();
    let mut rest = chunk.trim();
    while !rest.is_empty() {
        let Some((limit, boundary_char)) = rest.char_indices().nth(budget) else {
            pieces.push(rest.to_string());
            break;
        };
        // `rest[..limit]` holds exactly `budget` characters; a break on the next one also fits.
        let window = &rest[..limit + boundary_char.len_utf8()];
        let cut = match window.rfind(char::is_whitespace) {
            Some(index) if index > 0 => index,
            _ => limit,
        };
        pieces.push(rest[..cut].trim_end().to_string());
        rest = rest[cut..].trim_start();
    }
    pieces
}

/// Prefix each chunk with the tail of its predecessor, joined by a single space.
fn apply_overlap(chunks: Vec<String>, overlap: usize) -> Vec<String> {
    if chunks.len() < 2 || overlap == 0 {
        return chunks;
    }

    let mut overlapped = Vec::with_capacity(chunks.len());
    for (index, current) in chunks.iter().enumerate() {
        let tail = match index {
            0 => "",
            _ => word_tail(&chunks[index - 1], overlap),
        };
        if tail.is_empty() {
            overlapped.push(current.clone());
        } else {
            overlapped.push(format!("{tail} {current}"));
        }
    }
    overlapped
}

/// Longest suffix of `text` that starts at a word and fits in `limit` characters.
fn word_tail(text: &str, limit: usize) -> &str {
    if char_count(text) <= limit {
        return text;
    }

    let mut tail = "";
    for (index, ch) in text.char_indices().rev() {
        if !ch.is_whitespace() {
            continue;
        }
        let candidate = text[index + ch.len_utf8()..].trim_start();
        if char_count(candidate) > limit {
            break;
        }
        if !candidate.is_empty() {
            tail = candidate;
        }
    }
    tail
}
