//! In-memory vector index for chunk records.
//!
//! Two maps live behind one lock: `chunks` (chunk id to record) and
//! `by_document` (document id to the ids of its chunks). Every id listed in
//! `by_document` is a key of `chunks` and every stored chunk is listed under
//! its document. The index lives as long as the process; nothing is persisted.

use parking_lot::RwLock;
use rayon::prelude::*;
use serde::Serialize;
use std::cmp::Ordering;
use std::collections::{HashMap, HashSet};
use std::time::Instant;
use tracing::{debug, info};

use crate::chunk::{Chunk, ChunkId, DocumentId};
use crate::config::Number;
use crate::error::IndexError;
use crate::vector_ops::cosine_similarity;

#[derive(Debug, Default)]
struct IndexState {
    chunks: HashMap<ChunkId, Chunk>,
    by_document: HashMap<DocumentId, HashSet<ChunkId>>,
}

/// A retrieved chunk together with its similarity to the query.
#[derive(Debug, Clone)]
pub struct ScoredChunk {
    pub similarity: Number,
    pub chunk: Chunk,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IndexStats {
    pub total_chunks: usize,
    pub total_documents: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub average_chunks_per_document: Option<f64>,
}

/// Shared, thread-safe chunk store. Callers never need their own locking.
#[derive(Debug)]
pub struct VectorIndex {
    dimensions: usize,
    state: RwLock<IndexState>,
}

impl VectorIndex {
    pub fn new(dimensions: usize) -> Self {
        Self {
            dimensions,
            state: RwLock::new(IndexState::default()),
        }
    }

    pub fn dimensions(&self) -> usize {
        self.dimensions
    }

    /// Adds or overwrites a chunk by id and registers it under its document.
    pub fn insert(&self, chunk: Chunk) -> Result<(), IndexError> {
        if chunk.embedding.is_empty() {
            return Err(IndexError::EmptyEmbedding {
                chunk_id: chunk.id.to_string(),
            });
        }
        if chunk.embedding.len() != self.dimensions {
            return Err(IndexError::dimension_mismatch(
                self.dimensions,
                chunk.embedding.len(),
            ));
        }

        let mut state = self.state.write();
        state
            .by_document
            .entry(chunk.document_id)
            .or_default()
            .insert(chunk.id.clone());
        state.chunks.insert(chunk.id.clone(), chunk);
        Ok(())
    }

    /// Drops every chunk of `document_id` from both maps in one step.
    /// Returns how many chunks were removed; unknown ids are a no-op.
    pub fn remove_by_document(&self, document_id: DocumentId) -> usize {
        let mut state = self.state.write();
        let Some(chunk_ids) = state.by_document.remove(&document_id) else {
            return 0;
        };
        for chunk_id in &chunk_ids {
            state.chunks.remove(chunk_id);
        }
        info!(document_id = %document_id, removed = chunk_ids.len(), "removed document chunks");
        chunk_ids.len()
    }

    pub fn clear(&self) {
        let mut state = self.state.write();
        let removed = state.chunks.len();
        state.chunks.clear();
        state.by_document.clear();
        info!(removed, "cleared all vectors from index");
    }

    pub fn len(&self) -> usize {
        self.state.read().chunks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.state.read().chunks.is_empty()
    }

    pub fn contains(&self, chunk_id: &ChunkId) -> bool {
        self.state.read().chunks.contains_key(chunk_id)
    }

    pub fn get(&self, chunk_id: &ChunkId) -> Option<Chunk> {
        self.state.read().chunks.get(chunk_id).cloned()
    }

    /// Chunk ids registered for a document, sorted.
    pub fn document_chunk_ids(&self, document_id: DocumentId) -> Vec<ChunkId> {
        let state = self.state.read();
        let mut ids: Vec<ChunkId> = state
            .by_document
            .get(&document_id)
            .map(|ids| ids.iter().cloned().collect())
            .unwrap_or_default();
        ids.sort();
        ids
    }

    /// Full-scan cosine retrieval: the `top_k` chunks most similar to
    /// `query`, best first. Equal scores fall back to chunk id order, which is
    /// an implementation detail rather than a guarantee.
    pub fn retrieve(&self, query: &[Number], top_k: usize) -> Result<Vec<ScoredChunk>, IndexError> {
        let start = Instant::now();

        let state = self.state.read();
        if state.chunks.is_empty() || top_k == 0 {
            debug!(indexed = state.chunks.len(), top_k, "nothing to retrieve");
            return Ok(Vec::new());
        }
        if query.len() != self.dimensions {
            return Err(IndexError::dimension_mismatch(self.dimensions, query.len()));
        }

        let mut scored = state
            .chunks
            .par_iter()
            .map(|(_, chunk)| cosine_similarity(query, &chunk.embedding).map(|s| (s, chunk)))
            .collect::<Result<Vec<_>, IndexError>>()?;
        let scan_elapsed = start.elapsed();

        scored.sort_by(|a, b| match b.0.total_cmp(&a.0) {
            Ordering::Equal => a.1.id.cmp(&b.1.id),
            other => other,
        });
        scored.truncate(top_k);

        let results: Vec<ScoredChunk> = scored
            .into_iter()
            .map(|(similarity, chunk)| ScoredChunk {
                similarity,
                chunk: chunk.clone(),
            })
            .collect();

        debug!(
            scanned = state.chunks.len(),
            returned = results.len(),
            top_similarity = ?results.first().map(|r| r.similarity),
            scan = ?scan_elapsed,
            elapsed = ?start.elapsed(),
            "retrieved similar chunks"
        );
        Ok(results)
    }

    /// Consistent snapshot of the index size.
    pub fn stats(&self) -> IndexStats {
        let state = self.state.read();
        let total_documents = state.by_document.len();
        let average_chunks_per_document = if total_documents == 0 {
            None
        } else {
            let registered: usize = state.by_document.values().map(HashSet::len).sum();
            Some(registered as f64 / total_documents as f64)
        };
        IndexStats {
            total_chunks: state.chunks.len(),
            total_documents,
            average_chunks_per_document,
        }
    }
}
