//! Request/response boundary over the pipelines.
//!
//! Every DTO serializes with camelCase keys. Provider outages never turn into
//! error responses here; only malformed requests do.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::chunk::{DocumentId, DocumentIds};
use crate::chunker::{normalize_whitespace, Chunker};
use crate::config::{Number, Settings};
use crate::embedding::ResilientEmbedder;
use crate::error::{QueryError, UploadError};
use crate::generation::{AnswerMode, ResilientGenerator};
use crate::index::{IndexStats, VectorIndex};
use crate::ingest::{IngestPipeline, IngestReport};
use crate::query::QueryPipeline;

pub const SERVICE_NAME: &str = "Legal Compliance Checker";

const STATUS_SUCCESS: &str = "success";
const STATUS_ERROR: &str = "error";

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadReceipt {
    pub message: String,
    pub document_id: DocumentId,
    pub document_name: String,
    pub chunks_created: usize,
    pub chunks_failed: usize,
    pub status: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryRequest {
    pub query: String,
    #[serde(default)]
    pub max_results: Option<usize>,
}

impl QueryRequest {
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            max_results: None,
        }
    }

    pub fn with_max_results(mut self, max_results: usize) -> Self {
        self.max_results = Some(max_results);
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryResponse {
    pub answer: String,
    pub referenced_clauses: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub confidence: Option<Number>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mode: Option<AnswerMode>,
    pub status: String,
}

impl QueryResponse {
    fn error(err: &QueryError) -> Self {
        Self {
            answer: err.to_string(),
            referenced_clauses: Vec::new(),
            confidence: None,
            mode: None,
            status: STATUS_ERROR.to_string(),
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == STATUS_SUCCESS
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatResponse {
    pub response: String,
    pub status: String,
    pub model: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RemovalReceipt {
    pub document_id: DocumentId,
    pub chunks_removed: usize,
    pub status: String,
}

pub type StatsResponse = IndexStats;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthResponse {
    pub status: String,
    pub service: String,
    pub documents_processed: usize,
    pub chunks_stored: usize,
}

/// One index, two pipelines, and the document id source they share.
pub struct ComplianceService {
    index: Arc<VectorIndex>,
    chunker: Chunker,
    ingest: IngestPipeline,
    query: QueryPipeline,
    ids: DocumentIds,
    default_top_k: usize,
}

impl ComplianceService {
    pub fn new(
        settings: &Settings,
        embedder: ResilientEmbedder,
        generator: ResilientGenerator,
    ) -> Self {
        let index = Arc::new(VectorIndex::new(embedder.dimensions()));
        let embedder = Arc::new(embedder);
        let generator = Arc::new(generator);
        Self {
            chunker: Chunker::new(settings.chunk_size, settings.chunk_overlap),
            ingest: IngestPipeline::new(Arc::clone(&index), Arc::clone(&embedder)),
            query: QueryPipeline::new(Arc::clone(&index), embedder, generator)
                .with_max_top_k(settings.max_top_k),
            index,
            ids: DocumentIds::new(),
            default_top_k: settings.top_k,
        }
    }

    /// Wires the remote providers named in `settings`, or their fallbacks.
    pub fn from_settings(settings: &Settings) -> Self {
        Self::new(
            settings,
            ResilientEmbedder::from_settings(settings),
            ResilientGenerator::from_settings(settings),
        )
    }

    pub fn index(&self) -> &Arc<VectorIndex> {
        &self.index
    }

    /// Cleans, chunks, and indexes a document's extracted text.
    pub fn upload(&self, name: &str, text: &str) -> Result<UploadReceipt, UploadError> {
        let name = name.trim();
        if name.is_empty() {
            return Err(UploadError::EmptyName);
        }
        let cleaned = normalize_whitespace(text);
        if cleaned.is_empty() {
            warn!(document = name, "no text content extracted");
            return Err(UploadError::ExtractionEmpty);
        }
        let chunks = self.chunker.chunk(&cleaned);
        if chunks.is_empty() {
            return Err(UploadError::NoChunks);
        }

        let document_id = self.ids.next_id();
        let report = self.ingest.ingest(document_id, name, &chunks);
        if report.is_total_failure() {
            return Err(UploadError::AllChunksFailed {
                chunks: report.total,
            });
        }

        let mut message = format!(
            "Document uploaded and processed successfully. {} chunks created.",
            report.indexed
        );
        if !report.failed.is_empty() {
            message.push_str(&format!(" {} chunks failed to process.", report.failed.len()));
        }
        info!(%document_id, document = name, chunks = report.indexed, "document uploaded");
        Ok(UploadReceipt {
            message,
            document_id,
            document_name: name.to_string(),
            chunks_created: report.indexed,
            chunks_failed: report.failed.len(),
            status: STATUS_SUCCESS.to_string(),
        })
    }

    /// Indexes chunks that were produced elsewhere under a caller-chosen id.
    pub fn ingest(&self, document_id: DocumentId, name: &str, chunks: &[String]) -> IngestReport {
        self.ingest.ingest(document_id, name, chunks)
    }

    pub fn query(&self, request: &QueryRequest) -> QueryResponse {
        let top_k = request.max_results.unwrap_or(self.default_top_k);
        match self.query.answer(&request.query, top_k) {
            Ok(answer) => QueryResponse {
                answer: answer.text,
                referenced_clauses: answer.references,
                confidence: answer.confidence,
                mode: Some(answer.mode),
                status: STATUS_SUCCESS.to_string(),
            },
            Err(e) => {
                warn!(error = %e, "rejected query");
                QueryResponse::error(&e)
            }
        }
    }

    /// Single-excerpt question answering for conversational clients.
    pub fn chat(&self, message: &str) -> ChatResponse {
        let response = self.query(&QueryRequest::new(message).with_max_results(1));
        ChatResponse {
            response: response.answer,
            status: response.status,
            model: self.query.generator().model_name().to_string(),
        }
    }

    pub fn remove(&self, document_id: DocumentId) -> RemovalReceipt {
        RemovalReceipt {
            document_id,
            chunks_removed: self.index.remove_by_document(document_id),
            status: STATUS_SUCCESS.to_string(),
        }
    }

    pub fn clear(&self) {
        self.index.clear();
    }

    pub fn stats(&self) -> StatsResponse {
        self.index.stats()
    }

    pub fn health(&self) -> HealthResponse {
        let stats = self.index.stats();
        HealthResponse {
            status: "healthy".to_string(),
            service: SERVICE_NAME.to_string(),
            documents_processed: stats.total_documents,
            chunks_stored: stats.total_chunks,
        }
    }
}
