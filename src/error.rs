//! Error types for the retrieval and answering core.
//!
//! Provider failures are absorbed by the resilient wrappers in
//! [`crate::embedding`] and [`crate::generation`]; only structural misuse
//! reaches callers of the pipelines.

use thiserror::Error;

/// Errors raised by the in-memory vector index.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum IndexError {
    /// Two vectors of different length were compared or stored.
    #[error("Dimension mismatch: expected {expected}, actual {actual}")]
    DimensionMismatch {
        /// Dimension fixed by the embedding provider.
        expected: usize,
        /// Length of the offending vector.
        actual: usize,
    },

    /// A chunk arrived without an embedding.
    #[error("Chunk {chunk_id} has an empty embedding")]
    EmptyEmbedding {
        /// Identifier of the rejected chunk.
        chunk_id: String,
    },
}

impl IndexError {
    pub fn dimension_mismatch(expected: usize, actual: usize) -> Self {
        Self::DimensionMismatch { expected, actual }
    }
}

/// Failures of a remote (or fallback) AI provider.
#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("provider returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("malformed provider response: {0}")]
    Malformed(String),

    #[error("provider returned an empty result")]
    Empty,

    #[error("provider returned {actual} dimensions, expected {expected}")]
    Dimension { expected: usize, actual: usize },

    #[error("fallback embedding failed: {0}")]
    Fallback(String),
}

/// Structural errors of the query pipeline.
#[derive(Debug, Error)]
pub enum QueryError {
    #[error("Query cannot be empty")]
    EmptyQuery,

    #[error("Max results must be between 1 and {max} (got {requested})")]
    InvalidTopK { requested: usize, max: usize },

    #[error(transparent)]
    Index(#[from] IndexError),
}

/// Reasons an upload is rejected as a whole.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum UploadError {
    #[error("Document name cannot be empty")]
    EmptyName,

    #[error("No text content could be extracted from the document")]
    ExtractionEmpty,

    #[error("Document could not be processed into searchable chunks")]
    NoChunks,

    #[error("Failed to process document chunks ({chunks} of {chunks} failed)")]
    AllChunksFailed { chunks: usize },
}
