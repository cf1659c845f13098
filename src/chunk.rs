use crate::config::Number;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DocumentId(pub u64);

impl fmt::Display for DocumentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u64> for DocumentId {
    fn from(value: u64) -> Self {
        DocumentId(value)
    }
}

/// Hands out document ids that are never reused within the process.
#[derive(Debug)]
pub struct DocumentIds {
    next: AtomicU64,
}

impl DocumentIds {
    pub fn new() -> Self {
        Self {
            next: AtomicU64::new(1),
        }
    }

    pub fn next_id(&self) -> DocumentId {
        DocumentId(self.next.fetch_add(1, Ordering::Relaxed))
    }
}

impl Default for DocumentIds {
    fn default() -> Self {
        Self::new()
    }
}

/// Storage key of a chunk, derived only from its document and position.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ChunkId(String);

impl ChunkId {
    pub fn new(document_id: DocumentId, index: usize) -> Self {
        ChunkId(format!("doc_{}_chunk_{}", document_id.0, index))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ChunkId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Chunk {
    pub id: ChunkId,
    pub document_id: DocumentId,
    pub text: String,
    pub embedding: Vec<Number>,
    pub index: usize,
    pub references: Vec<String>,
}

impl Chunk {
    pub fn new(
        document_id: DocumentId,
        index: usize,
        text: String,
        embedding: Vec<Number>,
        references: Vec<String>,
    ) -> Self {
        Self {
            id: ChunkId::new(document_id, index),
            document_id,
            text,
            embedding,
            index,
            references,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chunk_id_is_derived_from_document_and_position() {
        let id = ChunkId::new(DocumentId(42), 3);
        assert_eq!(id.as_str(), "doc_42_chunk_3");
        assert_eq!(id, ChunkId::new(DocumentId(42), 3));
        assert_ne!(id, ChunkId::new(DocumentId(4), 23));
    }

    #[test]
    fn document_ids_are_unique_across_threads() {
        let ids = DocumentIds::new();
        let mut all: Vec<DocumentId> = std::thread::scope(|scope| {
            let handles: Vec<_> = (0..4)
                .map(|_| scope.spawn(|| (0..250).map(|_| ids.next_id()).collect::<Vec<_>>()))
                .collect();
            handles
                .into_iter()
                .flat_map(|h| h.join().unwrap())
                .collect()
        });
        all.sort();
        all.dedup();
        assert_eq!(all.len(), 1000);
    }
}
