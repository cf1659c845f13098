use std::sync::Arc;
use std::time::Instant;

use rayon::prelude::*;
use serde::Serialize;
use tracing::{error, info, warn};

use crate::chunk::{Chunk, DocumentId};
use crate::embedding::{EmbeddingRole, ResilientEmbedder};
use crate::index::VectorIndex;
use crate::references::extract_references;

/// Outcome of one ingest call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IngestReport {
    pub document_id: DocumentId,
    pub total: usize,
    pub indexed: usize,
    /// Stored chunks whose embedding came from the deterministic fallback.
    pub fallback_embeddings: usize,
    /// Texts of the chunks that were not stored, in input order.
    pub failed: Vec<String>,
}

impl IngestReport {
    pub fn is_total_failure(&self) -> bool {
        self.total > 0 && self.failed.len() == self.total
    }
}

enum ChunkOutcome {
    Stored { fallback: bool },
    Failed,
}

pub struct IngestPipeline {
    index: Arc<VectorIndex>,
    embedder: Arc<ResilientEmbedder>,
}

impl IngestPipeline {
    pub fn new(index: Arc<VectorIndex>, embedder: Arc<ResilientEmbedder>) -> Self {
        Self { index, embedder }
    }

    /// Embeds and indexes every chunk of a document. Each chunk succeeds or
    /// fails on its own; a failure never stops the rest of the batch.
    pub fn ingest(
        &self,
        document_id: DocumentId,
        document_name: &str,
        chunks: &[String],
    ) -> IngestReport {
        let start = Instant::now();
        info!(%document_id, document = document_name, chunks = chunks.len(), "ingesting document");

        let outcomes: Vec<ChunkOutcome> = chunks
            .par_iter()
            .enumerate()
            .map(|(position, text)| self.ingest_chunk(document_id, position, text))
            .collect();

        let mut report = IngestReport {
            document_id,
            total: chunks.len(),
            indexed: 0,
            fallback_embeddings: 0,
            failed: Vec::new(),
        };
        for (outcome, text) in outcomes.into_iter().zip(chunks) {
            match outcome {
                ChunkOutcome::Stored { fallback } => {
                    report.indexed += 1;
                    if fallback {
                        report.fallback_embeddings += 1;
                    }
                }
                ChunkOutcome::Failed => report.failed.push(text.clone()),
            }
        }

        if report.fallback_embeddings > 0 {
            warn!(
                %document_id,
                fallback = report.fallback_embeddings,
                "some chunks were embedded with fallback vectors"
            );
        }
        info!(
            %document_id,
            indexed = report.indexed,
            failed = report.failed.len(),
            elapsed = ?start.elapsed(),
            "document ingested"
        );
        report
    }

    fn ingest_chunk(&self, document_id: DocumentId, position: usize, text: &str) -> ChunkOutcome {
        let embedding = match self.embedder.embed(text, EmbeddingRole::Document) {
            Ok(embedding) if !embedding.is_empty() => embedding,
            Ok(_) => {
                error!(%document_id, position, "chunk embedding was empty");
                return ChunkOutcome::Failed;
            }
            Err(e) => {
                error!(%document_id, position, error = %e, "failed to embed chunk");
                return ChunkOutcome::Failed;
            }
        };

        let fallback = embedding.is_fallback();
        let chunk = Chunk::new(
            document_id,
            position,
            text.to_string(),
            embedding.vector,
            extract_references(text),
        );
        match self.index.insert(chunk) {
            Ok(()) => ChunkOutcome::Stored { fallback },
            Err(e) => {
                error!(%document_id, position, error = %e, "failed to index chunk");
                ChunkOutcome::Failed
            }
        }
    }
}
