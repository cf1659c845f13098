//! Retrieval-augmented question answering over policy documents.
//!
//! Documents are split into overlapping sentence chunks, embedded, and kept
//! in an in-memory [`index::VectorIndex`]. Queries retrieve the closest chunks
//! and ask a language model to answer strictly from them. Both AI providers
//! degrade to deterministic fallbacks, so a well-formed request always gets
//! an answer.

pub mod chunk;
pub mod chunker;
pub mod config;
pub mod embedding;
pub mod error;
pub mod generation;
pub mod index;
pub mod ingest;
pub mod logging;
pub mod query;
pub mod references;
pub mod service;
pub mod vector_ops;

pub use chunk::{Chunk, ChunkId, DocumentId};
pub use config::Settings;
pub use index::VectorIndex;
pub use service::ComplianceService;
