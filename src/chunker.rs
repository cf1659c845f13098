//! Sentence-aware, token-budgeted chunking with overlap.
//!
//! Token counts are a fixed four-characters-per-token estimate, not a real
//! tokenizer. The chunker is pure: identical input and parameters always give
//! identical output.

use serde::Serialize;
use tracing::debug;

use crate::references::extract_references;

pub const CHARS_PER_TOKEN: usize = 4;

/// Upper bound on the sentences carried over into the next chunk.
pub const MAX_OVERLAP_SENTENCES: usize = 3;

/// Splits documents into overlapping chunks of roughly `chunk_size` tokens.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Chunker {
    chunk_size: usize,
    overlap: usize,
}

/// A chunk annotated for display by the CLI.
#[derive(Debug, Clone, Serialize)]
pub struct ChunkPreview {
    pub index: usize,
    pub tokens: usize,
    pub references: Vec<String>,
    pub text: String,
}

impl Chunker {
    pub fn new(chunk_size: usize, overlap: usize) -> Self {
        Self {
            chunk_size: chunk_size.max(1),
            overlap,
        }
    }

    pub fn chunk(&self, text: &str) -> Vec<String> {
        chunk_text(text, self.chunk_size, self.overlap)
    }

    pub fn preview(&self, text: &str) -> Vec<ChunkPreview> {
        self.chunk(text)
            .into_iter()
            .enumerate()
            .map(|(index, text)| ChunkPreview {
                index,
                tokens: estimate_tokens(&text),
                references: extract_references(&text),
                text,
            })
            .collect()
    }
}

/// `max(1, ceil(chars / 4))`.
pub fn estimate_tokens(text: &str) -> usize {
    let chars = text.chars().count();
    ((chars + CHARS_PER_TOKEN - 1) / CHARS_PER_TOKEN).max(1)
}

/// Splits on `.`, `!` or `?` followed by whitespace. The punctuation stays
/// with its sentence; blank pieces are dropped.
pub fn split_sentences(text: &str) -> Vec<&str> {
    let mut sentences = Vec::new();
    let mut start = 0;
    let mut chars = text.char_indices().peekable();

    while let Some((_, c)) = chars.next() {
        if !matches!(c, '.' | '!' | '?') {
            continue;
        }
        if let Some(&(next, following)) = chars.peek() {
            if following.is_whitespace() {
                let sentence = text[start..next].trim();
                if !sentence.is_empty() {
                    sentences.push(sentence);
                }
                start = next;
            }
        }
    }

    let tail = text[start..].trim();
    if !tail.is_empty() {
        sentences.push(tail);
    }
    sentences
}

pub fn chunk_text(text: &str, chunk_size: usize, overlap: usize) -> Vec<String> {
    let sentences = split_sentences(text);
    if sentences.is_empty() {
        return Vec::new();
    }

    let costs: Vec<usize> = sentences.iter().map(|s| estimate_tokens(s)).collect();
    let mut chunks = Vec::new();
    // The running chunk is always the contiguous run sentences[start..i].
    let mut start = 0;
    let mut running = 0;

    for i in 0..sentences.len() {
        if running + costs[i] > chunk_size && i > start {
            chunks.push(join_sentences(&sentences[start..i]));

            // Overlap never pushes the seeded chunk past the budget on its own.
            let budget = overlap.min(chunk_size.saturating_sub(costs[i]));
            let floor = start.max(i.saturating_sub(MAX_OVERLAP_SENTENCES));
            let mut seed_start = i;
            let mut seeded = 0;
            while seed_start > floor && seeded + costs[seed_start - 1] <= budget {
                seed_start -= 1;
                seeded += costs[seed_start];
            }

            start = seed_start;
            running = seeded;
        }
        running += costs[i];
    }
    chunks.push(join_sentences(&sentences[start..]));

    debug!(chunks = chunks.len(), sentences = sentences.len(), "split text into chunks");
    chunks
}

fn join_sentences(sentences: &[&str]) -> String {
    sentences.join(" ").trim().to_string()
}

/// Collapses runs of whitespace into single spaces and trims the result.
pub fn normalize_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}
