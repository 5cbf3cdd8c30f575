//! Document chunking strategies.
//!
//! This module provides the [`Chunker`] trait and two implementations:
//!
//! - [`FixedSizeChunker`] splits by character count with configurable overlap
//! - [`SentenceChunker`] keeps the same bound, but cuts at paragraph, sentence or word
//!   boundaries when one falls inside the window
//!
//! Both keep exactly `overlap` characters between consecutive chunks, so the
//! original text is recovered by concatenating the first chunk with every
//! following chunk minus its first `overlap` characters.

use serde::{Deserialize, Serialize};

use crate::config::RagConfig;
use crate::document::{Chunk, Document};
use crate::error::{RagError, Result};

/// Chunk size and overlap, in characters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkParams {
    pub size: usize,
    pub overlap: usize,
}

impl ChunkParams {
    pub fn new(size: usize, overlap: usize) -> Self {
        Self { size, overlap }
    }

    fn check(&self, document_id: &str) -> Result<()> {
        if self.size == 0 {
            return Err(RagError::chunking(document_id, "chunk size must be greater than zero"));
        }
        if self.overlap >= self.size {
            return Err(RagError::chunking(
                document_id,
                format!(
                    "chunk overlap ({}) must be less than chunk size ({})",
                    self.overlap, self.size
                ),
            ));
        }
        Ok(())
    }
}

impl From<&RagConfig> for ChunkParams {
    fn from(config: &RagConfig) -> Self {
        Self { size: config.chunk_size, overlap: config.chunk_overlap }
    }
}

/// A strategy for splitting documents into chunks.
///
/// Implementations must be deterministic: the same document and params
/// always produce the same chunks, in order, with the same IDs.
pub trait Chunker: Send + Sync {
    /// Split a document into ordered chunks.
    ///
    /// Returns an empty `Vec` if the document has no text.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::Chunking`] if `params` are unusable.
    fn split(&self, document: &Document, params: &ChunkParams) -> Result<Vec<Chunk>>;
}

/// Splits text into fixed-size chunks by character count with configurable overlap.
///
/// Chunk IDs are generated as `{document_id}_{chunk_index}`. Each chunk inherits
/// the parent document's metadata plus `chunk_index`, `total_chunks`,
/// `start_offset` and `end_offset`.
///
/// # Example
///
/// ```rust,ignore
/// use ragport::{ChunkParams, Chunker, FixedSizeChunker};
///
/// let chunks = FixedSizeChunker.split(&document, &ChunkParams::new(256, 50))?;
/// ```
#[derive(Debug, Clone, Copy, Default)]
pub struct FixedSizeChunker;

impl Chunker for FixedSizeChunker {
    fn split(&self, document: &Document, params: &ChunkParams) -> Result<Vec<Chunk>> {
        params.check(&document.id)?;
        Ok(build_chunks(document, params, false))
    }
}

/// Splits text into windows of at most `size` characters, preferring to cut
/// after a blank line, then after a sentence terminator (`.`, `!`, `?`
/// followed by whitespace), then before whitespace.
///
/// Falls back to a hard cut when no boundary lies far enough past the
/// overlap region. Whitespace is never dropped, so offsets stay exact.
#[derive(Debug, Clone, Copy, Default)]
pub struct SentenceChunker;

impl Chunker for SentenceChunker {
    fn split(&self, document: &Document, params: &ChunkParams) -> Result<Vec<Chunk>> {
        params.check(&document.id)?;
        Ok(build_chunks(document, params, true))
    }
}

fn build_chunks(document: &Document, params: &ChunkParams, snap: bool) -> Vec<Chunk> {
    let text = document.text_content();
    if text.is_empty() {
        return Vec::new();
    }

    let chars: Vec<char> = text.chars().collect();
    let spans = split_spans(&chars, params, snap);
    let total = spans.len();

    spans
        .into_iter()
        .enumerate()
        .map(|(index, (start, end))| {
            let mut metadata = document.metadata.clone();
            metadata.insert("chunk_index".to_string(), index.into());
            metadata.insert("total_chunks".to_string(), total.into());
            metadata.insert("start_offset".to_string(), start.into());
            metadata.insert("end_offset".to_string(), end.into());
            Chunk {
                id: Chunk::chunk_id(&document.id, index),
                document_id: document.id.clone(),
                index,
                content: chars[start..end].iter().collect(),
                metadata,
            }
        })
        .collect()
}

/// Compute `[start, end)` character spans. Every span is longer than the
/// overlap, so `start` strictly increases.
fn split_spans(chars: &[char], params: &ChunkParams, snap: bool) -> Vec<(usize, usize)> {
    let len = chars.len();
    let mut spans = Vec::new();
    let mut start = 0;

    while start < len {
        let hard_end = (start + params.size).min(len);
        let end = if snap && hard_end < len {
            find_boundary(chars, start + params.overlap + 1, hard_end).unwrap_or(hard_end)
        } else {
            hard_end
        };
        spans.push((start, end));
        if end == len {
            break;
        }
        start = end - params.overlap;
    }

    spans
}

/// Find the best cut position in `lo..=hi`.
fn find_boundary(chars: &[char], lo: usize, hi: usize) -> Option<usize> {
    if lo > hi {
        return None;
    }
    let candidates = || (lo..=hi).rev();

    let paragraph = candidates().find(|&b| b >= 2 && chars[b - 2] == '\n' && chars[b - 1] == '\n');
    if paragraph.is_some() {
        return paragraph;
    }

    let sentence = candidates().find(|&b| {
        b < chars.len() && matches!(chars[b - 1], '.' | '!' | '?') && chars[b].is_whitespace()
    });
    if sentence.is_some() {
        return sentence;
    }

    candidates().find(|&b| b < chars.len() && chars[b].is_whitespace())
}
